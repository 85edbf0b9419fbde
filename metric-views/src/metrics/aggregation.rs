use std::fmt;

use crate::error::{MetricError, MetricResult};

/// Default boundaries of an explicit bucket histogram when neither a view nor
/// the instrument supplies any.
pub(crate) const DEFAULT_HISTOGRAM_BOUNDARIES: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0, 7500.0,
    10000.0,
];

/// The way recorded measurements are summarized.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Aggregation {
    /// An aggregation that drops all recorded data.
    Drop,

    /// Use the default aggregation of the instrument kind:
    ///
    /// * Counter ⇨ Sum
    /// * UpDownCounter ⇨ Sum
    /// * Gauge ⇨ LastValue
    /// * Histogram ⇨ ExplicitBucketHistogram
    Default,

    /// An aggregation that summarizes a set of measurements as their arithmetic
    /// sum.
    Sum,

    /// An aggregation that summarizes a set of measurements as the last one made.
    LastValue,

    /// An aggregation that summarizes a set of measurements as a histogram with
    /// explicitly defined buckets.
    ExplicitBucketHistogram {
        /// The strictly increasing, finite bucket boundaries.
        ///
        /// `n` boundaries define `n + 1` buckets. Buckets are inclusive of their
        /// lower boundary and exclusive of their upper boundary: bucket `i`
        /// counts values `v` with `boundaries[i - 1] <= v < boundaries[i]`. The
        /// boundaries `[0.0, 5.0, 10.0]` define:
        ///
        /// (-∞, 0.0), [0.0, 5.0), [5.0, 10.0), [10.0, +∞)
        boundaries: Vec<f64>,

        /// Whether to record the min and max of the distribution.
        record_min_max: bool,
    },
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Drop => "Drop",
            Aggregation::Default => "Default",
            Aggregation::Sum => "Sum",
            Aggregation::LastValue => "LastValue",
            Aggregation::ExplicitBucketHistogram { .. } => "ExplicitBucketHistogram",
        };

        f.write_str(name)
    }
}

impl Aggregation {
    /// Validate that this aggregation has correct configuration.
    pub fn validate(&self) -> MetricResult<()> {
        match self {
            Aggregation::Drop | Aggregation::Default | Aggregation::Sum | Aggregation::LastValue => {
                Ok(())
            }
            Aggregation::ExplicitBucketHistogram { boundaries, .. } => {
                validate_bucket_boundaries(boundaries)
            }
        }
    }
}

pub(crate) fn validate_bucket_boundaries(boundaries: &[f64]) -> MetricResult<()> {
    if boundaries.is_empty() {
        return Err(MetricError::Config(
            "Bucket boundaries must contain at least one value".into(),
        ));
    }

    if boundaries.iter().any(|b| !b.is_finite()) {
        return Err(MetricError::Config(
            "Bucket boundaries must not contain NaN, Infinity, or -Infinity".into(),
        ));
    }

    if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(MetricError::Config(format!(
            "Bucket boundaries must be sorted and not contain any duplicates: {boundaries:?}"
        )));
    }

    Ok(())
}
