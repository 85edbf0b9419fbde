use std::{
    fmt,
    sync::{Arc, Mutex, Weak},
};

use crate::error::{MetricError, MetricResult};

use super::{
    data::CollectedMetrics, instrument::InstrumentKind, pipeline::Pipeline, reader::MetricReader,
    Temporality,
};

/// A simple [MetricReader] that allows an application to read metrics on demand.
///
/// Clones share the same state, so a clone kept by the application collects
/// what the provider registered with the original.
///
/// See [ManualReaderBuilder] for configuration options.
///
/// # Example
///
/// ```
/// use metric_views::metrics::ManualReader;
///
/// // can specify additional reader configuration
/// let reader = ManualReader::builder().build();
/// # drop(reader)
/// ```
#[derive(Clone)]
pub struct ManualReader {
    inner: Arc<Mutex<ManualReaderInner>>,
    temporality: Temporality,
}

impl Default for ManualReader {
    fn default() -> Self {
        ManualReader::builder().build()
    }
}

impl fmt::Debug for ManualReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ManualReader")
    }
}

#[derive(Debug, Default)]
struct ManualReaderInner {
    pipeline: Option<Weak<Pipeline>>,
    is_shutdown: bool,
}

impl ManualReader {
    /// Configuration for this reader
    pub fn builder() -> ManualReaderBuilder {
        ManualReaderBuilder::default()
    }

    /// A [MetricReader] which is directly called to collect metrics.
    pub(crate) fn new(temporality: Temporality) -> Self {
        ManualReader {
            inner: Arc::new(Mutex::new(ManualReaderInner::default())),
            temporality,
        }
    }
}

impl MetricReader for ManualReader {
    ///  Register a pipeline which enables the caller to read metrics from the
    ///  provider on demand.
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Only register once. If pipeline is already set, do nothing.
        if inner.pipeline.is_none() {
            inner.pipeline = Some(pipeline);
        } else {
            otel_warn!(
                name: "ManualReader.DuplicateRegistration",
                message = "The pipeline is already registered to the Reader. Registering pipeline multiple times is not allowed."
            );
        }
    }

    /// Gathers all metrics from the provider.
    ///
    /// Returns an error if called after shutdown.
    fn collect(&self, collected: &mut CollectedMetrics) -> MetricResult<()> {
        let inner = self.inner.lock()?;
        if inner.is_shutdown {
            return Err(MetricError::AlreadyShutdown);
        }

        match inner.pipeline.as_ref().and_then(|w| w.upgrade()) {
            Some(pipeline) => pipeline.produce(collected),
            None => Err(MetricError::Other(
                "reader is not registered with a meter provider".into(),
            )),
        }
    }

    /// ForceFlush is a no-op, it always returns Ok.
    fn force_flush(&self) -> MetricResult<()> {
        Ok(())
    }

    /// Closes any connections and frees any resources used by the reader.
    fn shutdown(&self) -> MetricResult<()> {
        let mut inner = self.inner.lock()?;
        if inner.is_shutdown {
            return Err(MetricError::AlreadyShutdown);
        }

        // Any future call to collect will now return an error.
        inner.pipeline = None;
        inner.is_shutdown = true;

        Ok(())
    }

    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        kind.temporality_preference(self.temporality)
    }
}

/// Configuration for a [ManualReader]
#[derive(Debug, Default)]
pub struct ManualReaderBuilder {
    temporality: Temporality,
}

impl ManualReaderBuilder {
    /// New manual builder configuration
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the [Temporality] of the exported metrics. Defaults to
    /// [Temporality::Cumulative].
    pub fn with_temporality(mut self, temporality: Temporality) -> Self {
        self.temporality = temporality;
        self
    }

    /// Create a new [ManualReader] from this configuration.
    pub fn build(self) -> ManualReader {
        ManualReader::new(self.temporality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_before_registration_fails() {
        let reader = ManualReader::builder().build();
        let err = reader
            .collect(&mut CollectedMetrics::default())
            .unwrap_err();
        assert!(matches!(err, MetricError::Other(_)));
    }

    #[test]
    fn shutdown_is_terminal() {
        let reader = ManualReader::default();
        assert!(reader.shutdown().is_ok());
        assert!(matches!(
            reader.collect(&mut CollectedMetrics::default()),
            Err(MetricError::AlreadyShutdown)
        ));
        assert!(matches!(reader.shutdown(), Err(MetricError::AlreadyShutdown)));
    }

    #[test]
    fn delta_preference_keeps_up_down_counter_cumulative() {
        let reader = ManualReader::builder()
            .with_temporality(Temporality::Delta)
            .build();
        assert_eq!(
            reader.temporality(InstrumentKind::Histogram),
            Temporality::Delta
        );
        assert_eq!(
            reader.temporality(InstrumentKind::UpDownCounter),
            Temporality::Cumulative
        );
        assert_eq!(
            ManualReader::default().temporality(InstrumentKind::Counter),
            Temporality::Cumulative
        );
    }
}
