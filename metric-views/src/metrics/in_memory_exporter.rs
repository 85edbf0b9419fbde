use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use crate::error::{MetricError, MetricResult};

use super::{data::CollectedMetrics, exporter::PushMetricExporter, Temporality};

/// An exporter that keeps every exported batch in memory.
///
/// Useful in tests: the batches are retrieved with
/// [`get_finished_metrics`](InMemoryMetricExporter::get_finished_metrics).
/// Clones share the same storage.
///
/// # Example
///
/// ```
/// use metric_views::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
/// use metric_views::KeyValue;
///
/// let exporter = InMemoryMetricExporter::default();
/// let provider = SdkMeterProvider::builder()
///     .with_reader(PeriodicReader::builder(exporter.clone()).build())
///     .build();
///
/// let histogram = provider.meter("example").u64_histogram("size").build().unwrap();
/// histogram.record(12, &[KeyValue::new("key", "value")]).unwrap();
///
/// provider.force_flush().unwrap();
/// let batches = exporter.get_finished_metrics().unwrap();
/// assert_eq!(batches.len(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryMetricExporter {
    metrics: Arc<Mutex<VecDeque<CollectedMetrics>>>,
    is_shutdown: Arc<AtomicBool>,
    temporality: Temporality,
}

impl fmt::Debug for InMemoryMetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMetricExporter")
            .field("temporality", &self.temporality)
            .finish()
    }
}

impl Default for InMemoryMetricExporter {
    fn default() -> Self {
        InMemoryMetricExporterBuilder::new().build()
    }
}

/// Builder for [`InMemoryMetricExporter`].
#[derive(Debug, Default)]
pub struct InMemoryMetricExporterBuilder {
    temporality: Option<Temporality>,
}

impl InMemoryMetricExporterBuilder {
    /// Creates a new instance of the `InMemoryMetricExporterBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the [Temporality] of the exporter.
    pub fn with_temporality(mut self, temporality: Temporality) -> Self {
        self.temporality = Some(temporality);
        self
    }

    /// Creates a new instance of the `InMemoryMetricExporter`.
    pub fn build(self) -> InMemoryMetricExporter {
        InMemoryMetricExporter {
            metrics: Default::default(),
            is_shutdown: Default::default(),
            temporality: self.temporality.unwrap_or_default(),
        }
    }
}

impl InMemoryMetricExporter {
    /// Returns every batch exported so far, oldest first.
    pub fn get_finished_metrics(&self) -> MetricResult<Vec<CollectedMetrics>> {
        let metrics = self.metrics.lock()?;
        Ok(metrics.iter().cloned().collect())
    }

    /// Clears the internal storage of finished metrics.
    pub fn reset(&self) {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl PushMetricExporter for InMemoryMetricExporter {
    async fn export(&self, metrics: &CollectedMetrics) -> MetricResult<()> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Err(MetricError::AlreadyShutdown);
        }
        self.metrics.lock()?.push_back(metrics.clone());
        Ok(())
    }

    fn force_flush(&self) -> MetricResult<()> {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> MetricResult<()> {
        self.is_shutdown.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        self.temporality
    }
}
