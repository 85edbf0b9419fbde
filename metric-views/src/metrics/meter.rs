use core::fmt;
use std::{
    any,
    borrow::Cow,
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    common::InstrumentationScope,
    error::{MetricError, MetricResult},
};

use super::{
    aggregation::validate_bucket_boundaries,
    instrument::{
        validate_instrument_name, validate_instrument_unit, Instrument, InstrumentKind,
        ResolvedMeasure,
    },
    instruments::{Counter, Gauge, Histogram, HistogramBuilder, InstrumentBuilder, UpDownCounter},
    internal::Number,
    meter_provider::ProviderState,
    pipeline::{Pipeline, Resolver, ViewCache},
};

/// Creates the instruments of one instrumentation scope.
///
/// Obtained from [`SdkMeterProvider::meter`](super::SdkMeterProvider::meter).
/// Cloning is cheap, clones create instruments in the same scope.
///
/// # Example
///
/// ```
/// use metric_views::metrics::SdkMeterProvider;
/// use metric_views::KeyValue;
///
/// let provider = SdkMeterProvider::default();
/// let meter = provider.meter("checkout");
///
/// let histogram = meter
///     .u64_histogram("cart.size")
///     .with_description("Items per cart")
///     .with_unit("{item}")
///     .with_boundaries(vec![1.0, 5.0, 10.0])
///     .build()
///     .unwrap();
/// histogram.record(3, &[KeyValue::new("region", "eu")]).unwrap();
/// ```
#[derive(Clone)]
pub struct Meter {
    pub(crate) inner: Arc<SdkMeter>,
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter")
            .field("scope", &self.inner.scope)
            .finish()
    }
}

impl Meter {
    pub(crate) fn new(inner: Arc<SdkMeter>) -> Self {
        Meter { inner }
    }

    /// Creates a builder for a counter recording `u64` increments.
    pub fn u64_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Counter<u64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a counter recording `f64` increments.
    pub fn f64_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Counter<f64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an up-down counter recording `i64` changes.
    pub fn i64_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, UpDownCounter<i64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an up-down counter recording `f64` changes.
    pub fn f64_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, UpDownCounter<f64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a gauge recording `u64` values.
    pub fn u64_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<u64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a gauge recording `i64` values.
    pub fn i64_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<i64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a gauge recording `f64` values.
    pub fn f64_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<f64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a histogram recording `u64` values.
    pub fn u64_histogram(&self, name: impl Into<Cow<'static, str>>) -> HistogramBuilder<'_, u64> {
        HistogramBuilder::new(self, name.into())
    }

    /// Creates a builder for a histogram recording `f64` values.
    pub fn f64_histogram(&self, name: impl Into<Cow<'static, str>>) -> HistogramBuilder<'_, f64> {
        HistogramBuilder::new(self, name.into())
    }
}

/// The identity an instrument name is registered with in a scope.
#[derive(Debug, Clone, PartialEq)]
struct Registration {
    name: Cow<'static, str>,
    kind: InstrumentKind,
    unit: Cow<'static, str>,
    number: &'static str,
    description: Cow<'static, str>,
}

/// Handles the creation and coordination of the instruments of a single
/// instrumentation scope.
pub(crate) struct SdkMeter {
    scope: InstrumentationScope,
    state: Arc<ProviderState>,
    /// Instruments created so far, keyed by their lowercased name.
    registrations: Mutex<HashMap<String, Registration>>,
    u64_resolver: Resolver<u64>,
    i64_resolver: Resolver<i64>,
    f64_resolver: Resolver<f64>,
}

impl SdkMeter {
    pub(crate) fn new(
        scope: InstrumentationScope,
        pipeline: Option<Arc<Pipeline>>,
        state: Arc<ProviderState>,
    ) -> Self {
        let view_cache = ViewCache::default();

        SdkMeter {
            scope,
            state,
            registrations: Default::default(),
            u64_resolver: Resolver::new(pipeline.clone(), Arc::clone(&view_cache)),
            i64_resolver: Resolver::new(pipeline.clone(), Arc::clone(&view_cache)),
            f64_resolver: Resolver::new(pipeline, view_cache),
        }
    }

    fn create<T: Number>(
        &self,
        resolver: &Resolver<T>,
        kind: InstrumentKind,
        name: Cow<'static, str>,
        description: Option<Cow<'static, str>>,
        unit: Option<Cow<'static, str>>,
        boundaries: Option<&[f64]>,
    ) -> MetricResult<ResolvedMeasure<T>> {
        if self.state.is_shutdown() {
            return Err(MetricError::AlreadyShutdown);
        }

        validate_instrument_name(name.as_ref())?;
        let unit = unit.unwrap_or_default();
        validate_instrument_unit(unit.as_ref())?;
        if let Some(boundaries) = boundaries {
            validate_bucket_boundaries(boundaries)?;
        }

        let description = self.register(Registration {
            name: name.clone(),
            kind,
            unit: unit.clone(),
            number: any::type_name::<T>(),
            description: description.unwrap_or_default(),
        })?;

        let inst = Instrument {
            name,
            description,
            kind,
            unit,
            scope: self.scope.clone(),
        };
        let measure = resolver.measures(inst, boundaries)?;

        Ok(ResolvedMeasure {
            measure,
            state: Arc::clone(&self.state),
        })
    }

    /// Records the identity of a new instrument, returning the description
    /// the instrument must use.
    ///
    /// A name already registered in this scope with another kind, unit or
    /// number type is a conflict. A different description alone is logged
    /// and the first description is kept, so both instruments share the
    /// same stream.
    fn register(&self, registration: Registration) -> MetricResult<Cow<'static, str>> {
        let mut registrations = self
            .registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let key = registration.name.to_lowercase();

        match registrations.get(&key) {
            None => {
                let description = registration.description.clone();
                registrations.insert(key, registration);
                Ok(description)
            }
            Some(existing)
                if existing.kind != registration.kind
                    || existing.unit != registration.unit
                    || existing.number != registration.number =>
            {
                otel_warn!(
                    name: "Instrument.Conflict",
                    instrument_name = registration.name.as_ref(),
                    meter_name = self.scope.name()
                );
                Err(MetricError::InstrumentConflict(format!(
                    "instrument {} already registered as {:?} {}({}), requested {:?} {}({})",
                    existing.name,
                    existing.kind,
                    existing.number,
                    existing.unit,
                    registration.kind,
                    registration.number,
                    registration.unit,
                )))
            }
            Some(existing) => {
                if existing.description != registration.description {
                    otel_debug!(
                        name: "Instrument.DescriptionMismatch",
                        instrument_name = registration.name.as_ref(),
                        kept = existing.description.as_ref(),
                        ignored = registration.description.as_ref()
                    );
                }
                Ok(existing.description.clone())
            }
        }
    }
}

impl fmt::Debug for SdkMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter").field("scope", &self.scope).finish()
    }
}

macro_rules! try_from_builder {
    ($handle:ident, $kind:expr, $number:ty, $resolver:ident) => {
        impl TryFrom<InstrumentBuilder<'_, $handle<$number>>> for $handle<$number> {
            type Error = MetricError;

            fn try_from(builder: InstrumentBuilder<'_, $handle<$number>>) -> MetricResult<Self> {
                let meter = &builder.meter.inner;
                meter
                    .create(
                        &meter.$resolver,
                        $kind,
                        builder.name,
                        builder.description,
                        builder.unit,
                        None,
                    )
                    .map($handle::new)
            }
        }
    };
}

try_from_builder!(Counter, InstrumentKind::Counter, u64, u64_resolver);
try_from_builder!(Counter, InstrumentKind::Counter, f64, f64_resolver);
try_from_builder!(UpDownCounter, InstrumentKind::UpDownCounter, i64, i64_resolver);
try_from_builder!(UpDownCounter, InstrumentKind::UpDownCounter, f64, f64_resolver);
try_from_builder!(Gauge, InstrumentKind::Gauge, u64, u64_resolver);
try_from_builder!(Gauge, InstrumentKind::Gauge, i64, i64_resolver);
try_from_builder!(Gauge, InstrumentKind::Gauge, f64, f64_resolver);

macro_rules! try_from_histogram_builder {
    ($number:ty, $resolver:ident) => {
        impl TryFrom<HistogramBuilder<'_, $number>> for Histogram<$number> {
            type Error = MetricError;

            fn try_from(builder: HistogramBuilder<'_, $number>) -> MetricResult<Self> {
                let meter = &builder.meter.inner;
                meter
                    .create(
                        &meter.$resolver,
                        InstrumentKind::Histogram,
                        builder.name,
                        builder.description,
                        builder.unit,
                        builder.boundaries.as_deref(),
                    )
                    .map(Histogram::new)
            }
        }
    };
}

try_from_histogram_builder!(u64, u64_resolver);
try_from_histogram_builder!(f64, f64_resolver);
