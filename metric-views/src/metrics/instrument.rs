use std::{borrow::Cow, collections::HashSet, sync::Arc};

use crate::{
    common::{InstrumentationScope, Key, KeyValue},
    error::{MetricError, MetricResult},
    metrics::{aggregation::Aggregation, internal::Measure, meter_provider::ProviderState},
};

use super::Temporality;

// maximum length of instrument name
pub(crate) const INSTRUMENT_NAME_MAX_LENGTH: usize = 255;
// maximum length of instrument unit name
pub(crate) const INSTRUMENT_UNIT_NAME_MAX_LENGTH: usize = 63;
const INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS: [char; 4] = ['_', '.', '-', '/'];

// instrument validation error strings
pub(crate) const INSTRUMENT_NAME_EMPTY: &str = "instrument name must be non-empty";
pub(crate) const INSTRUMENT_NAME_LENGTH: &str = "instrument name must be less than 256 characters";
pub(crate) const INSTRUMENT_NAME_INVALID_CHAR: &str =
    "characters in instrument name must be ASCII and belong to the alphanumeric characters, '_', '.', '-' and '/'";
pub(crate) const INSTRUMENT_NAME_FIRST_ALPHABETIC: &str =
    "instrument name must start with an alphabetic character";
pub(crate) const INSTRUMENT_UNIT_LENGTH: &str = "instrument unit must be less than 64 characters";
pub(crate) const INSTRUMENT_UNIT_INVALID_CHAR: &str = "characters in instrument unit must be ASCII";

pub(crate) fn validate_instrument_name(name: &str) -> MetricResult<()> {
    if name.is_empty() {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_EMPTY,
        ));
    }
    if name.len() > INSTRUMENT_NAME_MAX_LENGTH {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_LENGTH,
        ));
    }
    if name.starts_with(|c: char| !c.is_ascii_alphabetic()) {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_FIRST_ALPHABETIC,
        ));
    }
    if name.contains(|c: char| {
        !c.is_ascii_alphanumeric() && !INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS.contains(&c)
    }) {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_INVALID_CHAR,
        ));
    }
    Ok(())
}

pub(crate) fn validate_instrument_unit(unit: &str) -> MetricResult<()> {
    if unit.len() > INSTRUMENT_UNIT_NAME_MAX_LENGTH {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_UNIT_LENGTH,
        ));
    }
    if unit.contains(|c: char| !c.is_ascii()) {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_UNIT_INVALID_CHAR,
        ));
    }
    Ok(())
}

/// The identifier of a group of instruments that all perform the same function.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Records increasing values synchronously with the code path they are
    /// measuring.
    Counter,
    /// Records increasing and decreasing values synchronously with the code
    /// path they are measuring.
    UpDownCounter,
    /// Records a distribution of values synchronously with the code path they
    /// are measuring.
    Histogram,
    /// Records the current value synchronously with the code path it is
    /// measuring.
    Gauge,
}

impl InstrumentKind {
    /// Select the [Temporality] for this kind given a reader's preference.
    ///
    /// UpDownCounter sums stay cumulative even for delta readers.
    pub(crate) fn temporality_preference(&self, temporality: Temporality) -> Temporality {
        match temporality {
            Temporality::Cumulative => Temporality::Cumulative,
            Temporality::Delta => match self {
                Self::Counter | Self::Histogram | Self::Gauge => Temporality::Delta,
                Self::UpDownCounter => Temporality::Cumulative,
            },
        }
    }
}

/// Describes an instrument at creation. Views match against it.
///
/// Two descriptors are equal when scope, name, kind, unit and description are
/// equal; equal descriptors always resolve to the same stream.
///
/// ```
/// use metric_views::metrics::{Instrument, Stream};
///
/// let my_view = |i: &Instrument| {
///     if i.name() == "my_histogram" {
///         Stream::builder().with_cardinality_limit(100).build().ok()
///     } else {
///         None
///     }
/// };
/// # let _ = my_view;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instrument {
    pub(crate) name: Cow<'static, str>,
    pub(crate) description: Cow<'static, str>,
    pub(crate) kind: InstrumentKind,
    pub(crate) unit: Cow<'static, str>,
    pub(crate) scope: InstrumentationScope,
}

impl Instrument {
    /// Instrument name.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Instrument description.
    pub fn description(&self) -> &str {
        self.description.as_ref()
    }

    /// Instrument kind.
    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    /// Instrument unit.
    pub fn unit(&self) -> &str {
        self.unit.as_ref()
    }

    /// Scope of the meter that created the instrument.
    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }
}

/// A builder for [Stream] overrides.
///
/// ```
/// use metric_views::metrics::{Aggregation, Stream};
///
/// let stream = Stream::builder()
///     .with_name("bar")
///     .with_aggregation(Aggregation::ExplicitBucketHistogram {
///         boundaries: vec![64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0],
///         record_min_max: true,
///     })
///     .build()
///     .unwrap();
/// # let _ = stream;
/// ```
#[derive(Default, Debug)]
pub struct StreamBuilder {
    name: Option<Cow<'static, str>>,
    description: Option<Cow<'static, str>>,
    unit: Option<Cow<'static, str>>,
    aggregation: Option<Aggregation>,
    allowed_attribute_keys: Option<Arc<HashSet<Key>>>,
    cardinality_limit: Option<usize>,
}

impl StreamBuilder {
    pub(crate) fn new() -> Self {
        StreamBuilder::default()
    }

    /// Rename the stream. Defaults to the instrument name.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the description. Defaults to the instrument description.
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Override the unit. Defaults to the instrument unit.
    pub fn with_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the aggregation. Defaults to the aggregation of the instrument kind.
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Keep only the listed attribute keys.
    ///
    /// Any attribute recorded for the stream with a key not in this set will be
    /// dropped. If the set is empty, all attributes will be dropped.
    pub fn with_allowed_attribute_keys(
        mut self,
        attribute_keys: impl IntoIterator<Item = Key>,
    ) -> Self {
        self.allowed_attribute_keys = Some(Arc::new(attribute_keys.into_iter().collect()));
        self
    }

    /// Maximum number of attribute sets tracked by the stream. Defaults to 2000.
    pub fn with_cardinality_limit(mut self, limit: usize) -> Self {
        self.cardinality_limit = Some(limit);
        self
    }

    /// Validate the configuration and build the [Stream].
    pub fn build(self) -> MetricResult<Stream> {
        if let Some(name) = &self.name {
            validate_instrument_name(name)?;
        }

        if let Some(unit) = &self.unit {
            validate_instrument_unit(unit)?;
        }

        if self.cardinality_limit == Some(0) {
            return Err(MetricError::Config(
                "Cardinality limit must be greater than 0".into(),
            ));
        }

        if let Some(aggregation) = &self.aggregation {
            aggregation.validate()?;
        }

        Ok(Stream {
            name: self.name,
            description: self.description,
            unit: self.unit,
            aggregation: self.aggregation,
            allowed_attribute_keys: self.allowed_attribute_keys,
            cardinality_limit: self.cardinality_limit,
        })
    }
}

/// Overrides applied to the stream of the instruments a view matches.
///
/// Unset fields fall back to the instrument's own values.
#[derive(Clone, Default, Debug)]
pub struct Stream {
    pub(crate) name: Option<Cow<'static, str>>,
    pub(crate) description: Option<Cow<'static, str>>,
    pub(crate) unit: Option<Cow<'static, str>>,
    pub(crate) aggregation: Option<Aggregation>,
    pub(crate) allowed_attribute_keys: Option<Arc<HashSet<Key>>>,
    pub(crate) cardinality_limit: Option<usize>,
}

impl Stream {
    /// Create a new stream builder with default values.
    pub fn builder() -> StreamBuilder {
        StreamBuilder::new()
    }

    /// The stream name override, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The aggregation override, if any.
    pub fn aggregation(&self) -> Option<&Aggregation> {
        self.aggregation.as_ref()
    }
}

/// Identity of a resolved stream.
///
/// Instruments whose resolved streams share an identity share one aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct InstrumentId {
    pub(crate) name: Cow<'static, str>,
    pub(crate) description: Cow<'static, str>,
    pub(crate) kind: InstrumentKind,
    pub(crate) unit: Cow<'static, str>,
    /// Underlying number type of the instrument.
    pub(crate) number: Cow<'static, str>,
}

impl InstrumentId {
    /// Instrument names are case-insensitive ASCII, so the name is lowercased
    /// before it is used as a cache key.
    pub(crate) fn normalize(&mut self) {
        if self.name.chars().any(|c| c.is_ascii_uppercase()) {
            self.name = self.name.to_ascii_lowercase().into();
        }
    }
}

/// The aggregator an instrument handle routes its measurements to.
///
/// `measure` is `None` when the resolved stream drops its data.
pub(crate) struct ResolvedMeasure<T> {
    pub(crate) measure: Option<Arc<dyn Measure<T>>>,
    pub(crate) state: Arc<ProviderState>,
}

impl<T: Copy + 'static> ResolvedMeasure<T> {
    pub(crate) fn call(&self, value: T, attrs: &[KeyValue]) -> MetricResult<()> {
        if self.state.is_shutdown() {
            self.state.record_dropped();
            otel_debug!(
                name: "Instrument.MeasurementDroppedAfterShutdown",
                message = "Measurement recorded after the MeterProvider was shut down."
            );
            return Err(MetricError::AlreadyShutdown);
        }

        if let Some(measure) = &self.measure {
            measure.call(value, attrs);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("validateName", "")]
    #[case("_startWithNoneAlphabet", INSTRUMENT_NAME_FIRST_ALPHABETIC)]
    #[case("utf8char锈", INSTRUMENT_NAME_INVALID_CHAR)]
    #[case("invalid name", INSTRUMENT_NAME_INVALID_CHAR)]
    #[case("allow/slash", "")]
    #[case("allow_under_score", "")]
    #[case("allow.dots.ok", "")]
    #[case("", INSTRUMENT_NAME_EMPTY)]
    #[case("\\allow\\slash /sec", INSTRUMENT_NAME_FIRST_ALPHABETIC)]
    #[case("Total $ Count", INSTRUMENT_NAME_INVALID_CHAR)]
    #[case("/not / allowed", INSTRUMENT_NAME_FIRST_ALPHABETIC)]
    fn stream_name_validation(#[case] name: &'static str, #[case] expected_error: &str) {
        let result = StreamBuilder::new().with_name(name).build();
        if expected_error.is_empty() {
            assert!(result.is_ok(), "{name}: {:?}", result.err());
        } else {
            let err = result.err().unwrap();
            assert!(
                matches!(err, MetricError::InvalidInstrumentConfiguration(msg) if msg == expected_error),
                "For name '{name}', expected error '{expected_error}'"
            );
        }
    }

    #[test]
    fn stream_name_length_limit() {
        assert!(StreamBuilder::new().with_name("a".repeat(255)).build().is_ok());
        let err = StreamBuilder::new()
            .with_name("a".repeat(256))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            MetricError::InvalidInstrumentConfiguration(INSTRUMENT_NAME_LENGTH)
        ));
    }

    #[rstest]
    #[case(
        "0123456789012345678901234567890123456789012345678901234567890123",
        INSTRUMENT_UNIT_LENGTH
    )]
    #[case("utf8char锈", INSTRUMENT_UNIT_INVALID_CHAR)]
    #[case("kb", "")]
    #[case("Kb/sec", "")]
    #[case("%", "")]
    #[case("", "")]
    fn stream_unit_validation(#[case] unit: &'static str, #[case] expected_error: &str) {
        let result = StreamBuilder::new()
            .with_name("valid_name")
            .with_unit(unit)
            .build();
        if expected_error.is_empty() {
            assert!(result.is_ok(), "{unit}: {:?}", result.err());
        } else {
            assert!(matches!(
                result,
                Err(MetricError::InvalidInstrumentConfiguration(msg)) if msg == expected_error
            ));
        }
    }

    #[test]
    fn stream_cardinality_limit_validation() {
        let err = StreamBuilder::new()
            .with_cardinality_limit(0)
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Config error Cardinality limit must be greater than 0"
        );

        for limit in [1, 10, 100, 1000] {
            assert!(StreamBuilder::new()
                .with_cardinality_limit(limit)
                .build()
                .is_ok());
        }
    }

    #[test]
    fn stream_rejects_invalid_histogram_boundaries() {
        for boundaries in [vec![], vec![5.0, 1.0], vec![1.0, f64::NAN]] {
            let result = StreamBuilder::new()
                .with_aggregation(Aggregation::ExplicitBucketHistogram {
                    boundaries: boundaries.clone(),
                    record_min_max: true,
                })
                .build();
            assert!(
                matches!(result, Err(MetricError::Config(_))),
                "{boundaries:?} should be rejected"
            );
        }
    }

    #[test]
    fn up_down_counter_stays_cumulative_for_delta_readers() {
        assert_eq!(
            InstrumentKind::UpDownCounter.temporality_preference(Temporality::Delta),
            Temporality::Cumulative
        );
        for kind in [
            InstrumentKind::Counter,
            InstrumentKind::Histogram,
            InstrumentKind::Gauge,
        ] {
            assert_eq!(
                kind.temporality_preference(Temporality::Delta),
                Temporality::Delta
            );
            assert_eq!(
                kind.temporality_preference(Temporality::Cumulative),
                Temporality::Cumulative
            );
        }
    }

    #[test]
    fn instrument_id_normalizes_name_case() {
        let mut id = InstrumentId {
            name: "Request.Latency".into(),
            description: "".into(),
            kind: InstrumentKind::Histogram,
            unit: "ms".into(),
            number: "f64".into(),
        };
        id.normalize();
        assert_eq!(id.name, "request.latency");
    }
}
