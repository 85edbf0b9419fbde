mod aggregate;
mod histogram;
mod last_value;
mod sum;
mod value_map;

use core::fmt;
use std::ops::{Add, AddAssign, Sub};

use crate::metrics::data::{AggregatedMetrics, MetricData};

pub(crate) use aggregate::{AggregateBuilder, AggregateFns, ComputeAggregation, Filter, Measure};
pub(crate) use value_map::STREAM_CARDINALITY_LIMIT;

/// The numeric types instruments record.
pub(crate) trait Number:
    Add<Output = Self>
    + AddAssign
    + Sub<Output = Self>
    + PartialOrd
    + fmt::Debug
    + Clone
    + Copy
    + PartialEq
    + Default
    + Send
    + Sync
    + 'static
{
    fn min() -> Self;
    fn max() -> Self;

    fn into_float(self) -> f64;

    /// Adds `other`, wrapping around on integer overflow instead of panicking.
    fn add_wrapping(self, other: Self) -> Self;

    /// Wrap collected data of this number type.
    fn make_aggregated_metrics(data: MetricData<Self>) -> AggregatedMetrics;
}

impl Number for i64 {
    fn min() -> Self {
        i64::MIN
    }

    fn max() -> Self {
        i64::MAX
    }

    fn into_float(self) -> f64 {
        // May have precision loss at high values
        self as f64
    }

    fn add_wrapping(self, other: Self) -> Self {
        i64::wrapping_add(self, other)
    }

    fn make_aggregated_metrics(data: MetricData<Self>) -> AggregatedMetrics {
        data.into()
    }
}

impl Number for u64 {
    fn min() -> Self {
        u64::MIN
    }

    fn max() -> Self {
        u64::MAX
    }

    fn into_float(self) -> f64 {
        // May have precision loss at high values
        self as f64
    }

    fn add_wrapping(self, other: Self) -> Self {
        u64::wrapping_add(self, other)
    }

    fn make_aggregated_metrics(data: MetricData<Self>) -> AggregatedMetrics {
        data.into()
    }
}

impl Number for f64 {
    fn min() -> Self {
        f64::MIN
    }

    fn max() -> Self {
        f64::MAX
    }

    fn into_float(self) -> f64 {
        self
    }

    fn add_wrapping(self, other: Self) -> Self {
        self + other
    }

    fn make_aggregated_metrics(data: MetricData<Self>) -> AggregatedMetrics {
        data.into()
    }
}
