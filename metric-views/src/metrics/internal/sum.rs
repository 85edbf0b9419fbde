use crate::common::KeyValue;
use crate::metrics::data::{self, AggregatedMetrics, MetricData, SumDataPoint};
use crate::metrics::Temporality;

use super::aggregate::{AggregateTimeInitiator, AttributeSetFilter, ComputeAggregation, Measure};
use super::value_map::{Aggregator, ValueMap};
use super::Number;

/// Running total of one attribute set.
#[derive(Clone, Copy, Debug, Default)]
struct Increment<T>(T);

impl<T: Number> Aggregator for Increment<T> {
    type Config = ();
    type PreComputedValue = T;

    fn create(_: &()) -> Self {
        Increment(T::default())
    }

    fn update(&mut self, _: &(), value: T) {
        self.0 = self.0.add_wrapping(value);
    }
}

/// Summarizes a set of measurements made as their arithmetic sum.
pub(crate) struct Sum<T: Number> {
    value_map: ValueMap<Increment<T>>,
    init_time: AggregateTimeInitiator,
    temporality: Temporality,
    filter: AttributeSetFilter,
    monotonic: bool,
}

impl<T: Number> Sum<T> {
    /// Returns an aggregator that summarizes a set of measurements as their
    /// arithmetic sum.
    ///
    /// Each sum is scoped by attributes and the aggregation cycle the measurements
    /// were made in.
    pub(crate) fn new(
        temporality: Temporality,
        filter: AttributeSetFilter,
        monotonic: bool,
        cardinality_limit: usize,
    ) -> Self {
        Sum {
            value_map: ValueMap::new((), cardinality_limit),
            init_time: AggregateTimeInitiator::default(),
            temporality,
            filter,
            monotonic,
        }
    }

    fn delta(&self) -> (usize, data::Sum<T>) {
        let time = self.init_time.delta();
        let mut data_points = Vec::new();
        self.value_map
            .collect_and_reset(&mut data_points, |attributes, total| SumDataPoint {
                attributes,
                value: total.0,
            });

        (
            data_points.len(),
            data::Sum {
                data_points,
                start_time: time.start,
                time: time.current,
                temporality: Temporality::Delta,
                is_monotonic: self.monotonic,
            },
        )
    }

    fn cumulative(&self) -> (usize, data::Sum<T>) {
        let time = self.init_time.cumulative();
        let mut data_points = Vec::new();
        self.value_map
            .collect_readonly(&mut data_points, |attributes, total| SumDataPoint {
                attributes,
                value: total.0,
            });

        (
            data_points.len(),
            data::Sum {
                data_points,
                start_time: time.start,
                time: time.current,
                temporality: Temporality::Cumulative,
                is_monotonic: self.monotonic,
            },
        )
    }
}

impl<T> Measure<T> for Sum<T>
where
    T: Number,
{
    fn call(&self, measurement: T, attrs: &[KeyValue]) {
        self.filter.apply(attrs, |filtered| {
            self.value_map.measure(measurement, filtered);
        })
    }
}

impl<T> ComputeAggregation for Sum<T>
where
    T: Number,
{
    fn call(&self) -> (usize, AggregatedMetrics) {
        let (len, sum) = match self.temporality {
            Temporality::Delta => self.delta(),
            Temporality::Cumulative => self.cumulative(),
        };
        (len, T::make_aggregated_metrics(MetricData::Sum(sum)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::internal::STREAM_CARDINALITY_LIMIT;

    #[test]
    fn up_down_sum_tracks_negative_values() {
        let sum = Sum::<i64>::new(
            Temporality::Cumulative,
            AttributeSetFilter::new(None),
            false,
            STREAM_CARDINALITY_LIMIT,
        );
        Measure::call(&sum, 10, &[KeyValue::new("queue", "a")]);
        Measure::call(&sum, -4, &[KeyValue::new("queue", "a")]);
        Measure::call(&sum, -1, &[]);

        let (count, data) = ComputeAggregation::call(&sum);
        assert_eq!(count, 2);
        let AggregatedMetrics::I64(MetricData::Sum(sum)) = data else {
            unreachable!()
        };
        assert!(!sum.is_monotonic);
        assert_eq!(sum.data_points[0].value, -1);
        assert_eq!(sum.data_points[1].value, 6);
    }

    #[test]
    fn delta_sum_reports_change_since_last_collection() {
        let sum = Sum::<f64>::new(
            Temporality::Delta,
            AttributeSetFilter::new(None),
            true,
            STREAM_CARDINALITY_LIMIT,
        );
        Measure::call(&sum, 1.5, &[]);
        let (_, first) = ComputeAggregation::call(&sum);
        Measure::call(&sum, 2.5, &[]);
        let (_, second) = ComputeAggregation::call(&sum);

        let (
            AggregatedMetrics::F64(MetricData::Sum(first)),
            AggregatedMetrics::F64(MetricData::Sum(second)),
        ) = (first, second)
        else {
            unreachable!()
        };
        assert_eq!(first.data_points[0].value, 1.5);
        assert_eq!(second.data_points[0].value, 2.5);
        assert_eq!(first.time, second.start_time);
    }

    #[test]
    fn integer_sum_wraps_on_overflow() {
        let sum = Sum::<u64>::new(
            Temporality::Cumulative,
            AttributeSetFilter::new(None),
            true,
            STREAM_CARDINALITY_LIMIT,
        );
        Measure::call(&sum, u64::MAX, &[]);
        Measure::call(&sum, 2, &[]);
        Measure::call(&sum, 3, &[]);

        let (_, data) = ComputeAggregation::call(&sum);
        let AggregatedMetrics::U64(MetricData::Sum(sum)) = data else {
            unreachable!()
        };
        assert_eq!(sum.data_points[0].value, 4);
    }
}
