use std::{
    env, fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex, Weak,
    },
    thread,
    time::{Duration, Instant},
};

use crate::error::{MetricError, MetricResult};

use super::{
    data::CollectedMetrics, exporter::PushMetricExporter, instrument::InstrumentKind,
    pipeline::Pipeline, reader::MetricReader, Temporality,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

const METRIC_EXPORT_INTERVAL_NAME: &str = "OTEL_METRIC_EXPORT_INTERVAL";
const METRIC_EXPORT_TIMEOUT_NAME: &str = "OTEL_METRIC_EXPORT_TIMEOUT";

/// Configuration options for [PeriodicReader].
///
/// By default the reader collects and exports every 60 seconds, or every
/// `OTEL_METRIC_EXPORT_INTERVAL` milliseconds when that variable is set. The
/// timeout bounds how long `force_flush` and `shutdown` wait for the export
/// thread, 30 seconds unless `OTEL_METRIC_EXPORT_TIMEOUT` says otherwise.
#[derive(Debug)]
pub struct PeriodicReaderBuilder<E> {
    interval: Duration,
    timeout: Duration,
    exporter: E,
}

fn duration_from_env(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().map(Duration::from_millis).ok())
        .filter(|d| !d.is_zero())
        .unwrap_or(default)
}

impl<E> PeriodicReaderBuilder<E>
where
    E: PushMetricExporter,
{
    fn new(exporter: E) -> Self {
        PeriodicReaderBuilder {
            interval: duration_from_env(METRIC_EXPORT_INTERVAL_NAME, DEFAULT_INTERVAL),
            timeout: duration_from_env(METRIC_EXPORT_TIMEOUT_NAME, DEFAULT_TIMEOUT),
            exporter,
        }
    }

    /// Configures the intervening time between exports for a [PeriodicReader].
    ///
    /// This option overrides any value set for the `OTEL_METRIC_EXPORT_INTERVAL`
    /// environment variable. A zero `interval` is ignored.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.interval = interval;
        }
        self
    }

    /// Configures how long flush and shutdown wait for an export to complete.
    ///
    /// This option overrides any value set for the `OTEL_METRIC_EXPORT_TIMEOUT`
    /// environment variable. A zero `timeout` is ignored.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    /// Create a [PeriodicReader] with the given config.
    pub fn build(self) -> PeriodicReader<E> {
        PeriodicReader::new(self.exporter, self.interval, self.timeout)
    }
}

/// A [MetricReader] that collects and exports metric data at a set interval
/// from a dedicated thread.
///
/// The export time is not counted towards the interval between attempts.
/// `force_flush` and `shutdown` export immediately, shutdown performs a final
/// export before the thread exits.
///
/// The [collect] method keeps returning metric data to the caller. It does
/// not send that data to the exporter outside of the interval.
///
/// [collect]: MetricReader::collect
pub struct PeriodicReader<E: PushMetricExporter> {
    inner: Arc<PeriodicReaderInner<E>>,
}

impl<E: PushMetricExporter> Clone for PeriodicReader<E> {
    fn clone(&self) -> Self {
        PeriodicReader {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: PushMetricExporter> fmt::Debug for PeriodicReader<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicReader")
            .field("interval", &self.inner.interval)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl<E: PushMetricExporter> PeriodicReader<E> {
    /// Configuration options for a periodic reader
    pub fn builder(exporter: E) -> PeriodicReaderBuilder<E> {
        PeriodicReaderBuilder::new(exporter)
    }

    fn new(exporter: E, interval: Duration, timeout: Duration) -> Self {
        let (message_sender, message_receiver): (Sender<Message>, Receiver<Message>) =
            mpsc::channel();
        let reader = PeriodicReader {
            inner: Arc::new(PeriodicReaderInner {
                exporter,
                message_sender: Mutex::new(message_sender),
                pipeline: Mutex::new(None),
                is_shutdown: AtomicBool::new(false),
                interval,
                timeout,
            }),
        };
        let cloned_reader = reader.clone();

        let spawned = thread::Builder::new()
            .name("MetricViews.PeriodicReader".to_string())
            .spawn(move || cloned_reader.run(message_receiver));

        if let Err(e) = spawned {
            otel_error!(
                name: "PeriodicReader.ThreadStartError",
                error = format!("{e:?}")
            );
        }
        reader
    }

    fn run(&self, messages: Receiver<Message>) {
        let interval = self.inner.interval;
        let mut interval_start = Instant::now();
        let mut remaining_interval = interval;
        otel_info!(
            name: "PeriodicReader.ThreadStarted",
            interval_in_millisecs = interval.as_millis() as u64,
            timeout_in_millisecs = self.inner.timeout.as_millis() as u64
        );

        loop {
            match messages.recv_timeout(remaining_interval) {
                Ok(Message::Flush(response)) => {
                    otel_debug!(name: "PeriodicReader.ExportingDueToFlush");
                    let _ = response.send(self.inner.collect_and_export());

                    // A flush past the expected export time replaces that export.
                    let elapsed = interval_start.elapsed();
                    if elapsed < interval {
                        remaining_interval = interval - elapsed;
                    } else {
                        interval_start = Instant::now();
                        remaining_interval = interval;
                    }
                }
                Ok(Message::Shutdown(response)) => {
                    otel_debug!(name: "PeriodicReader.ExportingDueToShutdown");
                    let result = self.inner.collect_and_export();
                    let shutdown = self.inner.exporter.shutdown_with_timeout(self.inner.timeout);
                    let _ = response.send(result.and(shutdown));
                    break;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let export_start = Instant::now();
                    otel_debug!(name: "PeriodicReader.ExportingDueToTimer");
                    // Failures are logged by the export itself.
                    let _ = self.inner.collect_and_export();

                    let took = export_start.elapsed();
                    interval_start = Instant::now();
                    remaining_interval = interval.saturating_sub(took);
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        otel_info!(name: "PeriodicReader.ThreadStopped");
    }
}

struct PeriodicReaderInner<E> {
    exporter: E,
    message_sender: Mutex<Sender<Message>>,
    pipeline: Mutex<Option<Weak<Pipeline>>>,
    is_shutdown: AtomicBool,
    interval: Duration,
    timeout: Duration,
}

impl<E: PushMetricExporter> PeriodicReaderInner<E> {
    fn collect(&self, collected: &mut CollectedMetrics) -> MetricResult<()> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Err(MetricError::AlreadyShutdown);
        }
        self.produce(collected)
    }

    fn produce(&self, collected: &mut CollectedMetrics) -> MetricResult<()> {
        let pipeline = self.pipeline.lock()?;
        match pipeline.as_ref() {
            Some(p) => p
                .upgrade()
                .ok_or_else(|| MetricError::Other("pipeline is dropped".into()))?
                .produce(collected),
            None => Err(MetricError::Other("pipeline is not registered".into())),
        }
    }

    /// Runs on the export thread, which still exports once after the reader
    /// is marked as shut down.
    fn collect_and_export(&self) -> MetricResult<()> {
        let mut collected = CollectedMetrics::default();
        if let Err(e) = self.produce(&mut collected) {
            otel_warn!(name: "PeriodicReader.CollectError", error = format!("{e}"));
            return Err(e);
        }

        if collected.scope_metrics.is_empty() {
            otel_debug!(name: "PeriodicReader.NoMetricsCollected");
            return Ok(());
        }

        futures_executor::block_on(self.exporter.export(&collected)).map_err(|e| {
            otel_warn!(name: "PeriodicReader.ExportError", error = format!("{e}"));
            e
        })
    }

    /// Sends a message to the export thread and waits for its answer for at
    /// most the configured timeout.
    fn call_thread(
        &self,
        message: impl FnOnce(Sender<MetricResult<()>>) -> Message,
    ) -> MetricResult<()> {
        let (response_tx, response_rx) = mpsc::channel();
        self.message_sender
            .lock()?
            .send(message(response_tx))
            .map_err(|e| MetricError::Other(e.to_string()))?;

        match response_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(MetricError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(MetricError::Other("export thread stopped".into()))
            }
        }
    }

    fn force_flush(&self) -> MetricResult<()> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Err(MetricError::AlreadyShutdown);
        }
        self.call_thread(Message::Flush)
    }

    fn shutdown(&self) -> MetricResult<()> {
        if self.is_shutdown.swap(true, Ordering::Relaxed) {
            return Err(MetricError::AlreadyShutdown);
        }
        self.call_thread(Message::Shutdown)
    }
}

enum Message {
    Flush(Sender<MetricResult<()>>),
    Shutdown(Sender<MetricResult<()>>),
}

impl<E: PushMetricExporter> MetricReader for PeriodicReader<E> {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        let mut inner = self.inner.pipeline.lock().unwrap_or_else(|e| e.into_inner());
        if inner.is_none() {
            *inner = Some(pipeline);
        } else {
            otel_warn!(
                name: "PeriodicReader.DuplicateRegistration",
                message = "The pipeline is already registered to the Reader. Registering pipeline multiple times is not allowed."
            );
        }
    }

    fn collect(&self, collected: &mut CollectedMetrics) -> MetricResult<()> {
        self.inner.collect(collected)
    }

    fn force_flush(&self) -> MetricResult<()> {
        self.inner.force_flush()
    }

    fn shutdown(&self) -> MetricResult<()> {
        self.inner.shutdown()
    }

    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        kind.temporality_preference(self.inner.exporter.temporality())
    }
}
