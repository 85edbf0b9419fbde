//! Interfaces for reading and producing metrics
use std::{fmt, sync::Weak};

use crate::error::MetricResult;

use super::{data::CollectedMetrics, pipeline::Pipeline, InstrumentKind, Temporality};

/// The interface between the meter provider and an exporter.
///
/// Control flow is bi-directional through the `MetricReader`, since the
/// provider initiates `force_flush` and `shutdown` while the reader initiates
/// collection. The `register_pipeline` method here informs the metric reader
/// that it can begin reading, signaling the start of bi-directional control
/// flow.
///
/// Push-based exporters that are periodic implement
/// [`PushMetricExporter`](super::exporter::PushMetricExporter) and are wrapped
/// in a [`PeriodicReader`](super::PeriodicReader). Pull-based consumers use
/// a [`ManualReader`](super::ManualReader), since they read on demand.
pub trait MetricReader: fmt::Debug + Send + Sync + 'static {
    /// Registers a [MetricReader] with a [Pipeline].
    ///
    /// The pipeline argument allows the `MetricReader` to signal the provider
    /// to collect and send aggregated metric measurements.
    fn register_pipeline(&self, pipeline: Weak<Pipeline>);

    /// Gathers all metric data related to the [MetricReader] and stores it in
    /// the provided [CollectedMetrics] reference.
    ///
    /// An error is returned if this is called after shutdown.
    fn collect(&self, collected: &mut CollectedMetrics) -> MetricResult<()>;

    /// Flushes all metric measurements held in an export pipeline.
    ///
    /// There is no guarantee that all telemetry be flushed or all resources have
    /// been released on error.
    fn force_flush(&self) -> MetricResult<()>;

    /// Flushes all metric measurements held in an export pipeline and releases any
    /// held computational resources.
    ///
    /// After `shutdown` is called, calls to `collect` will perform no operation and
    /// instead will return [`MetricError::AlreadyShutdown`](crate::MetricError::AlreadyShutdown).
    fn shutdown(&self) -> MetricResult<()>;

    /// The output temporality, a function of instrument kind.
    ///
    /// If not configured, the Cumulative temporality is used.
    fn temporality(&self, kind: InstrumentKind) -> Temporality;
}
