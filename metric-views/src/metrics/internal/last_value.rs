use crate::common::KeyValue;
use crate::metrics::data::{self, AggregatedMetrics, GaugeDataPoint, MetricData};
use crate::metrics::Temporality;

use super::aggregate::{AggregateTimeInitiator, AttributeSetFilter, ComputeAggregation, Measure};
use super::value_map::{Aggregator, ValueMap};
use super::Number;

/// Latest value of one attribute set.
#[derive(Clone, Copy, Debug, Default)]
struct Assign<T>(T);

impl<T: Number> Aggregator for Assign<T> {
    type Config = ();
    type PreComputedValue = T;

    fn create(_: &()) -> Self {
        Assign(T::default())
    }

    fn update(&mut self, _: &(), value: T) {
        self.0 = value;
    }
}

/// Summarizes a set of measurements as the last one made.
pub(crate) struct LastValue<T: Number> {
    value_map: ValueMap<Assign<T>>,
    init_time: AggregateTimeInitiator,
    temporality: Temporality,
    filter: AttributeSetFilter,
}

impl<T: Number> LastValue<T> {
    pub(crate) fn new(
        temporality: Temporality,
        filter: AttributeSetFilter,
        cardinality_limit: usize,
    ) -> Self {
        LastValue {
            value_map: ValueMap::new((), cardinality_limit),
            init_time: AggregateTimeInitiator::default(),
            temporality,
            filter,
        }
    }

    fn delta(&self) -> (usize, data::Gauge<T>) {
        let time = self.init_time.delta();
        let mut data_points = Vec::new();
        self.value_map
            .collect_and_reset(&mut data_points, |attributes, last| GaugeDataPoint {
                attributes,
                value: last.0,
            });

        (
            data_points.len(),
            data::Gauge {
                data_points,
                start_time: Some(time.start),
                time: time.current,
            },
        )
    }

    fn cumulative(&self) -> (usize, data::Gauge<T>) {
        let time = self.init_time.cumulative();
        let mut data_points = Vec::new();
        self.value_map
            .collect_readonly(&mut data_points, |attributes, last| GaugeDataPoint {
                attributes,
                value: last.0,
            });

        (
            data_points.len(),
            data::Gauge {
                data_points,
                start_time: None,
                time: time.current,
            },
        )
    }
}

impl<T> Measure<T> for LastValue<T>
where
    T: Number,
{
    fn call(&self, measurement: T, attrs: &[KeyValue]) {
        self.filter.apply(attrs, |filtered| {
            self.value_map.measure(measurement, filtered);
        })
    }
}

impl<T> ComputeAggregation for LastValue<T>
where
    T: Number,
{
    fn call(&self) -> (usize, AggregatedMetrics) {
        let (len, gauge) = match self.temporality {
            Temporality::Delta => self.delta(),
            Temporality::Cumulative => self.cumulative(),
        };
        (len, T::make_aggregated_metrics(MetricData::Gauge(gauge)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::internal::STREAM_CARDINALITY_LIMIT;

    #[test]
    fn delta_gauge_reports_only_updated_sets() {
        let gauge = LastValue::<f64>::new(
            Temporality::Delta,
            AttributeSetFilter::new(None),
            STREAM_CARDINALITY_LIMIT,
        );
        Measure::call(&gauge, 1.0, &[KeyValue::new("room", "a")]);
        Measure::call(&gauge, 2.0, &[KeyValue::new("room", "b")]);
        let (count, _) = ComputeAggregation::call(&gauge);
        assert_eq!(count, 2);

        Measure::call(&gauge, 3.0, &[KeyValue::new("room", "b")]);
        let (count, data) = ComputeAggregation::call(&gauge);
        assert_eq!(count, 1);
        let AggregatedMetrics::F64(MetricData::Gauge(gauge)) = data else {
            unreachable!()
        };
        assert_eq!(
            gauge.data_points,
            vec![GaugeDataPoint {
                attributes: vec![KeyValue::new("room", "b")],
                value: 3.0,
            }]
        );
        assert!(gauge.start_time.is_some());
    }
}
