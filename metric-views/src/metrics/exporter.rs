//! Interfaces for exporting metrics
use std::{future::Future, time::Duration};

use crate::error::MetricResult;

use super::{data::CollectedMetrics, Temporality};

/// Exporter handles the delivery of metric data to external receivers.
///
/// This is the final component in the metric push pipeline. It is driven by a
/// [`PeriodicReader`](super::PeriodicReader).
pub trait PushMetricExporter: Send + Sync + 'static {
    /// Export serializes and transmits metric data to a receiver.
    ///
    /// All retry logic must be contained in this function. The reader does
    /// not retry, errors returned here are logged and the next interval
    /// exports again.
    fn export(&self, metrics: &CollectedMetrics) -> impl Future<Output = MetricResult<()>> + Send;

    /// Flushes any metric data held by an exporter.
    fn force_flush(&self) -> MetricResult<()>;

    /// Releases any held computational resources.
    ///
    /// After shutdown is called, calls to export will perform no operation
    /// and instead will return an error indicating the shutdown state.
    fn shutdown_with_timeout(&self, timeout: Duration) -> MetricResult<()>;

    /// Shutdown with the default timeout of 5 seconds.
    fn shutdown(&self) -> MetricResult<()> {
        self.shutdown_with_timeout(Duration::from_secs(5))
    }

    /// The preferred [Temporality] of the exported data.
    fn temporality(&self) -> Temporality;
}
