//! # View configuration module
//!
//! A view is a selector, which instruments it applies to, and the stream
//! those instruments are aggregated into.

use metric_views::{
    metrics::{Aggregation, InstrumentKind, Stream, ViewRule},
    Key, MetricResult,
};
use serde::Deserialize;

/// One view of the document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    /// Instruments the view applies to.
    pub selector: SelectorConfig,
    /// Overrides for the matched instruments.
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Instrument match criteria. Unset criteria match everything, at least
/// one must be set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorConfig {
    /// Exact or wildcard (`*`, `?`) instrument name.
    pub instrument_name: Option<String>,
    pub instrument_type: Option<InstrumentTypeConfig>,
    pub unit: Option<String>,
    pub meter_name: Option<String>,
    pub meter_version: Option<String>,
}

/// The instrument kinds a selector can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentTypeConfig {
    Counter,
    UpDownCounter,
    Histogram,
    Gauge,
}

impl From<InstrumentTypeConfig> for InstrumentKind {
    fn from(value: InstrumentTypeConfig) -> Self {
        match value {
            InstrumentTypeConfig::Counter => InstrumentKind::Counter,
            InstrumentTypeConfig::UpDownCounter => InstrumentKind::UpDownCounter,
            InstrumentTypeConfig::Histogram => InstrumentKind::Histogram,
            InstrumentTypeConfig::Gauge => InstrumentKind::Gauge,
        }
    }
}

/// Stream overrides. Unset fields keep the instrument's own value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub aggregation: Option<AggregationConfig>,
    /// Attribute keys kept on measurements, others are dropped.
    pub attribute_keys: Option<Vec<String>>,
    pub cardinality_limit: Option<usize>,
}

/// Aggregation of a stream, written either as a bare name (`sum`) or as a
/// mapping for the histogram
/// (`explicit_bucket_histogram: { boundaries: [...] }`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "AggregationRepr")]
pub enum AggregationConfig {
    Drop,
    Default,
    Sum,
    LastValue,
    ExplicitBucketHistogram {
        boundaries: Vec<f64>,
        record_min_max: bool,
    },
}

/// The two YAML shapes an aggregation can take.
#[derive(Deserialize)]
#[serde(
    untagged,
    expecting = "an aggregation name or an `explicit_bucket_histogram` mapping"
)]
enum AggregationRepr {
    Name(AggregationName),
    Histogram(HistogramAggregation),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum AggregationName {
    Drop,
    Default,
    Sum,
    LastValue,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HistogramAggregation {
    explicit_bucket_histogram: HistogramConfig,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HistogramConfig {
    boundaries: Vec<f64>,
    #[serde(default = "record_min_max_default")]
    record_min_max: bool,
}

fn record_min_max_default() -> bool {
    true
}

impl From<AggregationRepr> for AggregationConfig {
    fn from(value: AggregationRepr) -> Self {
        match value {
            AggregationRepr::Name(AggregationName::Drop) => AggregationConfig::Drop,
            AggregationRepr::Name(AggregationName::Default) => AggregationConfig::Default,
            AggregationRepr::Name(AggregationName::Sum) => AggregationConfig::Sum,
            AggregationRepr::Name(AggregationName::LastValue) => AggregationConfig::LastValue,
            AggregationRepr::Histogram(HistogramAggregation {
                explicit_bucket_histogram: config,
            }) => AggregationConfig::ExplicitBucketHistogram {
                boundaries: config.boundaries,
                record_min_max: config.record_min_max,
            },
        }
    }
}

impl From<AggregationConfig> for Aggregation {
    fn from(value: AggregationConfig) -> Self {
        match value {
            AggregationConfig::Drop => Aggregation::Drop,
            AggregationConfig::Default => Aggregation::Default,
            AggregationConfig::Sum => Aggregation::Sum,
            AggregationConfig::LastValue => Aggregation::LastValue,
            AggregationConfig::ExplicitBucketHistogram {
                boundaries,
                record_min_max,
            } => Aggregation::ExplicitBucketHistogram {
                boundaries,
                record_min_max,
            },
        }
    }
}

impl StreamConfig {
    /// Validated stream built from the overrides.
    pub fn to_stream(&self) -> MetricResult<Stream> {
        let mut builder = Stream::builder();
        if let Some(name) = &self.name {
            builder = builder.with_name(name.clone());
        }
        if let Some(description) = &self.description {
            builder = builder.with_description(description.clone());
        }
        if let Some(unit) = &self.unit {
            builder = builder.with_unit(unit.clone());
        }
        if let Some(aggregation) = &self.aggregation {
            builder = builder.with_aggregation(aggregation.clone().into());
        }
        if let Some(keys) = &self.attribute_keys {
            builder = builder.with_allowed_attribute_keys(keys.iter().cloned().map(Key::from));
        }
        if let Some(limit) = self.cardinality_limit {
            builder = builder.with_cardinality_limit(limit);
        }
        builder.build()
    }
}

impl ViewConfig {
    /// Builds the [ViewRule] this view describes.
    pub fn to_view_rule(&self) -> MetricResult<ViewRule> {
        let selector = &self.selector;
        let mut builder = ViewRule::builder().with_stream(self.stream.to_stream()?);
        if let Some(name) = &selector.instrument_name {
            builder = builder.with_instrument_name(name.clone());
        }
        if let Some(kind) = selector.instrument_type {
            builder = builder.with_instrument_kind(kind.into());
        }
        if let Some(unit) = &selector.unit {
            builder = builder.with_instrument_unit(unit.clone());
        }
        if let Some(meter_name) = &selector.meter_name {
            builder = builder.with_scope_name(meter_name.clone());
        }
        if let Some(meter_version) = &selector.meter_version {
            builder = builder.with_scope_version(meter_version.clone());
        }
        builder.build()
    }
}
