use crate::common::KeyValue;
use crate::metrics::data::{self, HistogramDataPoint, MetricData};
use crate::metrics::Temporality;

use super::aggregate::{AggregateTimeInitiator, AttributeSetFilter, ComputeAggregation, Measure};
use super::value_map::{Aggregator, ValueMap};
use super::Number;

/// Bucket counts and statistics of one attribute set.
#[derive(Clone, Debug, PartialEq)]
struct Buckets<T> {
    counts: Vec<u64>,
    count: u64,
    total: T,
    min: T,
    max: T,
}

impl<T: Number> Buckets<T> {
    /// returns buckets with `n` bins.
    fn new(n: usize) -> Buckets<T> {
        Buckets {
            counts: vec![0; n],
            count: 0,
            total: T::default(),
            min: T::max(),
            max: T::min(),
        }
    }

    fn bin(&mut self, idx: usize, value: T) {
        self.counts[idx] += 1;
        self.count += 1;
        self.total = self.total.add_wrapping(value);
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value
        }
    }
}

impl<T: Number> Aggregator for Buckets<T> {
    /// Number of buckets
    type Config = usize;
    /// Value and bucket index
    type PreComputedValue = (T, usize);

    fn create(count: &usize) -> Self {
        Buckets::new(*count)
    }

    fn update(&mut self, _: &usize, (value, index): (T, usize)) {
        self.bin(index, value);
    }
}

/// Index of the bucket `value` falls into: the number of boundaries less than
/// or equal to it.
///
/// Buckets include their lower boundary, so with boundaries `[5.0, 10.0]` a
/// value of `5.0` lands in bucket 1, `[5.0, 10.0)`.
pub(crate) fn bucket_index(bounds: &[f64], value: f64) -> usize {
    bounds.partition_point(|&b| b <= value)
}

/// Summarizes a set of measurements as a histogram with explicitly defined
/// buckets.
pub(crate) struct Histogram<T: Number> {
    value_map: ValueMap<Buckets<T>>,
    init_time: AggregateTimeInitiator,
    temporality: Temporality,
    filter: AttributeSetFilter,
    bounds: Vec<f64>,
    record_min_max: bool,
    record_sum: bool,
}

impl<T: Number> Histogram<T> {
    /// Bounds are validated before the aggregator is built, they are sorted,
    /// finite and free of duplicates.
    pub(crate) fn new(
        temporality: Temporality,
        filter: AttributeSetFilter,
        bounds: Vec<f64>,
        record_min_max: bool,
        record_sum: bool,
        cardinality_limit: usize,
    ) -> Self {
        let buckets_count = bounds.len() + 1;
        Histogram {
            value_map: ValueMap::new(buckets_count, cardinality_limit),
            init_time: AggregateTimeInitiator::default(),
            temporality,
            filter,
            bounds,
            record_min_max,
            record_sum,
        }
    }

    fn data_point(&self, attributes: Vec<KeyValue>, b: &Buckets<T>) -> HistogramDataPoint<T> {
        HistogramDataPoint {
            attributes,
            count: b.count,
            bounds: self.bounds.clone(),
            bucket_counts: b.counts.clone(),
            sum: if self.record_sum {
                b.total
            } else {
                T::default()
            },
            min: if self.record_min_max {
                Some(b.min)
            } else {
                None
            },
            max: if self.record_min_max {
                Some(b.max)
            } else {
                None
            },
        }
    }

    fn delta(&self) -> (usize, data::Histogram<T>) {
        let time = self.init_time.delta();
        let mut data_points = Vec::new();
        self.value_map
            .collect_and_reset(&mut data_points, |attributes, b| {
                self.data_point(attributes, &b)
            });

        (
            data_points.len(),
            data::Histogram {
                data_points,
                start_time: time.start,
                time: time.current,
                temporality: Temporality::Delta,
            },
        )
    }

    fn cumulative(&self) -> (usize, data::Histogram<T>) {
        let time = self.init_time.cumulative();
        let mut data_points = Vec::new();
        self.value_map
            .collect_readonly(&mut data_points, |attributes, b| {
                self.data_point(attributes, b)
            });

        (
            data_points.len(),
            data::Histogram {
                data_points,
                start_time: time.start,
                time: time.current,
                temporality: Temporality::Cumulative,
            },
        )
    }
}

impl<T> Measure<T> for Histogram<T>
where
    T: Number,
{
    fn call(&self, measurement: T, attrs: &[KeyValue]) {
        let f = measurement.into_float();
        // NaN has no bucket and infinities would poison the sum.
        if !f.is_finite() {
            otel_debug!(
                name: "Histogram.NonFiniteMeasurementIgnored",
                value = format!("{f}")
            );
            return;
        }
        // The index is in the range `[0, bounds.len()]`, `bounds.len()` being
        // the overflow bucket `[bounds[bounds.len() - 1], +∞)`.
        let index = bucket_index(&self.bounds, f);

        self.filter.apply(attrs, |filtered| {
            self.value_map.measure((measurement, index), filtered);
        })
    }
}

impl<T> ComputeAggregation for Histogram<T>
where
    T: Number,
{
    fn call(&self) -> (usize, data::AggregatedMetrics) {
        let (len, histogram) = match self.temporality {
            Temporality::Delta => self.delta(),
            Temporality::Cumulative => self.cumulative(),
        };
        (len, T::make_aggregated_metrics(MetricData::Histogram(histogram)))
    }
}
