use core::fmt;
use std::{
    borrow::Cow,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use crate::{
    common::InstrumentationScope,
    error::{MetricError, MetricResult},
};

use super::{
    exporter::PushMetricExporter,
    meter::{Meter, SdkMeter},
    pipeline::Pipeline,
    reader::MetricReader,
    view::View,
    PeriodicReader,
};

/// Handles the creation and coordination of [Meter]s.
///
/// All meters created by a provider have the same [View]s applied to their
/// instruments and have their aggregated data collected by the same
/// [MetricReader]. This is a clonable handle to the provider itself: cloning
/// it creates a new reference, not a new provider. Dropping the last
/// reference triggers shutdown, which can also be invoked manually with
/// [`shutdown`](SdkMeterProvider::shutdown).
#[derive(Clone, Debug)]
pub struct SdkMeterProvider {
    inner: Arc<SdkMeterProviderInner>,
}

#[derive(Debug)]
struct SdkMeterProviderInner {
    pipeline: Option<Arc<Pipeline>>,
    meters: Mutex<HashMap<InstrumentationScope, Arc<SdkMeter>>>,
    state: Arc<ProviderState>,
}

/// Lifecycle of a provider, shared with every instrument it created.
#[derive(Debug, Default)]
pub(crate) struct ProviderState {
    shutdown_invoked: AtomicBool,
    dropped_measurements: AtomicU64,
}

impl ProviderState {
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown_invoked.load(Ordering::Relaxed)
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped_measurements.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for SdkMeterProvider {
    fn default() -> Self {
        SdkMeterProvider::builder().build()
    }
}

impl SdkMeterProvider {
    /// Return default [MeterProviderBuilder]
    pub fn builder() -> MeterProviderBuilder {
        MeterProviderBuilder::default()
    }

    /// Returns the [Meter] for the instrumentation scope called `name`.
    ///
    /// Meters are cached per scope, asking twice for the same name returns a
    /// handle to the same meter and so to the same instruments.
    pub fn meter(&self, name: impl Into<Cow<'static, str>>) -> Meter {
        self.meter_with_scope(InstrumentationScope::builder(name).build())
    }

    /// Returns the [Meter] for the given instrumentation scope.
    pub fn meter_with_scope(&self, scope: InstrumentationScope) -> Meter {
        if scope.name().is_empty() {
            otel_info!(
                name: "MeterNameEmpty",
                message = "Meter name is empty; consider providing a meaningful name. Meter will function normally and the provided name will be used as-is."
            );
        }

        let mut meters = self
            .inner
            .meters
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let meter = match meters.get(&scope) {
            Some(existing) => {
                otel_debug!(
                    name: "MeterProvider.ExistingMeterReturned",
                    meter_name = scope.name()
                );
                Arc::clone(existing)
            }
            None => {
                otel_debug!(
                    name: "MeterProvider.NewMeterCreated",
                    meter_name = scope.name()
                );
                let meter = Arc::new(SdkMeter::new(
                    scope.clone(),
                    self.inner.pipeline.clone(),
                    Arc::clone(&self.inner.state),
                ));
                meters.insert(scope, Arc::clone(&meter));
                meter
            }
        };
        Meter::new(meter)
    }

    /// Flushes all pending telemetry.
    ///
    /// There is no guarantee that all telemetry be flushed or all resources
    /// have been released on error.
    pub fn force_flush(&self) -> MetricResult<()> {
        self.inner.force_flush()
    }

    /// Shuts down the meter provider flushing all pending telemetry and
    /// releasing any held computational resources.
    ///
    /// The first call shuts the reader down. Subsequent calls perform no
    /// action and return [MetricError::AlreadyShutdown]. Measurements
    /// recorded after shutdown are dropped and counted, see
    /// [`dropped_measurements`](SdkMeterProvider::dropped_measurements).
    pub fn shutdown(&self) -> MetricResult<()> {
        otel_info!(
            name: "MeterProvider.Shutdown",
            message = "User initiated shutdown of MeterProvider."
        );
        self.inner.shutdown()
    }

    /// Number of measurements rejected because they were recorded after
    /// shutdown.
    pub fn dropped_measurements(&self) -> u64 {
        self.inner
            .state
            .dropped_measurements
            .load(Ordering::Relaxed)
    }
}

impl SdkMeterProviderInner {
    fn force_flush(&self) -> MetricResult<()> {
        if self.state.is_shutdown() {
            return Err(MetricError::AlreadyShutdown);
        }
        match &self.pipeline {
            Some(pipeline) => pipeline.force_flush(),
            None => Ok(()),
        }
    }

    fn shutdown(&self) -> MetricResult<()> {
        if self.state.shutdown_invoked.swap(true, Ordering::SeqCst) {
            // If the previous value was true, shutdown was already invoked.
            return Err(MetricError::AlreadyShutdown);
        }
        match &self.pipeline {
            Some(pipeline) => pipeline.shutdown(),
            None => Ok(()),
        }
    }
}

impl Drop for SdkMeterProviderInner {
    fn drop(&mut self) {
        // If user has already shutdown the provider manually by calling
        // shutdown(), then we don't need to call shutdown again.
        if self.state.is_shutdown() {
            otel_debug!(
                name: "MeterProvider.Drop.AlreadyShutdown",
                message = "MeterProvider was already shut down; drop will not attempt shutdown again."
            );
            return;
        }

        otel_info!(
            name: "MeterProvider.Drop",
            message = "Last reference of MeterProvider dropped, initiating shutdown."
        );
        if let Err(err) = self.shutdown() {
            otel_error!(
                name: "MeterProvider.Drop.ShutdownFailed",
                message = "Shutdown attempt failed during drop of MeterProvider.",
                reason = format!("{err}")
            );
        }
    }
}

/// Configuration options for a [SdkMeterProvider].
#[derive(Default)]
pub struct MeterProviderBuilder {
    reader: Option<Box<dyn MetricReader>>,
    views: Vec<Arc<dyn View>>,
}

impl MeterProviderBuilder {
    /// Associates a [MetricReader] with the provider.
    ///
    /// A provider has a single reader: a later call replaces the earlier
    /// reader. Without a reader, instruments are still created but nothing
    /// is aggregated.
    pub fn with_reader<T: MetricReader>(mut self, reader: T) -> Self {
        if let Some(previous) = self.reader.replace(Box::new(reader)) {
            otel_warn!(
                name: "MeterProviderBuilder.ReaderReplaced",
                message = "A reader was already configured. The previous reader is shut down and replaced."
            );
            // Stops the export thread of a replaced periodic reader.
            if let Err(err) = previous.shutdown() {
                otel_debug!(
                    name: "MeterProviderBuilder.ReplacedReaderShutdownFailed",
                    reason = format!("{err}")
                );
            }
        }
        self
    }

    /// Exports to `exporter` through a [PeriodicReader] using its default
    /// interval, or `OTEL_METRIC_EXPORT_INTERVAL` when set.
    ///
    /// Use [PeriodicReader::builder] and [with_reader](Self::with_reader) to
    /// configure the interval in code.
    pub fn with_periodic_exporter<T>(self, exporter: T) -> Self
    where
        T: PushMetricExporter,
    {
        self.with_reader(PeriodicReader::builder(exporter).build())
    }

    /// Appends a [View] to the provider.
    ///
    /// Views are evaluated in the order they were added, the first one that
    /// matches an instrument decides its stream. Instruments no view matches
    /// keep their own name and the default aggregation of their kind.
    pub fn with_view<T: View>(mut self, view: T) -> Self {
        self.views.push(Arc::new(view));
        self
    }

    /// Construct a new [SdkMeterProvider] with this configuration.
    pub fn build(self) -> SdkMeterProvider {
        otel_debug!(
            name: "MeterProvider.Building",
            builder = format!("{:?}", &self)
        );

        let views: Arc<[Arc<dyn View>]> = self.views.into();
        let meter_provider = SdkMeterProvider {
            inner: Arc::new(SdkMeterProviderInner {
                pipeline: self.reader.map(|reader| Pipeline::new(reader, views)),
                meters: Default::default(),
                state: Default::default(),
            }),
        };

        otel_info!(name: "MeterProvider.Built");
        meter_provider
    }
}

impl fmt::Debug for MeterProviderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterProviderBuilder")
            .field("reader", &self.reader)
            .field("views", &self.views.len())
            .finish()
    }
}
