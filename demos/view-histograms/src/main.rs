use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metric_views::{
    metrics::{
        data::{AggregatedMetrics, CollectedMetrics, MetricData},
        PushMetricExporter, SdkMeterProvider, Temporality,
    },
    KeyValue, MetricError, MetricResult,
};
use metric_views_config::ViewsConfig;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const METER_NAME: &str = "github.com/open-telemetry/opentelemetry-go/example/view";

const VIEWS: &str = r#"
views:
  - selector:
      meter_name: github.com/open-telemetry/opentelemetry-go/example/view
      instrument_name: custom_histogram
    stream:
      name: bar
      aggregation:
        explicit_bucket_histogram:
          boundaries: [64, 128, 256, 512, 1024, 2048, 4096]
  - selector:
      meter_name: github.com/open-telemetry/opentelemetry-go/example/view
      instrument_name: custom_histogram1
    stream:
      name: joe
      aggregation:
        explicit_bucket_histogram:
          boundaries: [5, 10, 15, 20, 25, 30, 35]
  - selector:
      meter_name: github.com/open-telemetry/opentelemetry-go/example/view
      instrument_name: custom_histogram2
    stream:
      name: tony
      aggregation:
        explicit_bucket_histogram:
          boundaries: [4, 8, 12, 16, 24, 28, 32]
reader:
  periodic:
    interval_millis: 10000
"#;

/// Logs every histogram data point it is handed.
#[derive(Debug, Default)]
struct LoggingExporter {
    is_shutdown: AtomicBool,
}

impl PushMetricExporter for LoggingExporter {
    async fn export(&self, metrics: &CollectedMetrics) -> MetricResult<()> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Err(MetricError::AlreadyShutdown);
        }
        for scope_metrics in &metrics.scope_metrics {
            for metric in &scope_metrics.metrics {
                let AggregatedMetrics::F64(MetricData::Histogram(histogram)) = &metric.data else {
                    info!(scope = scope_metrics.scope.name(), metric = %metric.name, "non-histogram metric");
                    continue;
                };
                for dp in &histogram.data_points {
                    info!(
                        scope = scope_metrics.scope.name(),
                        metric = %metric.name,
                        description = %metric.description,
                        attributes = ?dp.attributes,
                        bounds = ?dp.bounds,
                        bucket_counts = ?dp.bucket_counts,
                        count = dp.count,
                        sum = dp.sum,
                        min = ?dp.min,
                        max = ?dp.max,
                        "histogram data point"
                    );
                }
            }
        }
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
        Temporality::Cumulative
    }
}

fn init_meter_provider(config: &ViewsConfig) -> Result<SdkMeterProvider, Box<dyn Error>> {
    let reader = config.reader.periodic_reader(LoggingExporter::default())?;
    let builder = config.apply_views(SdkMeterProvider::builder().with_reader(reader))?;
    Ok(builder.build())
}

fn main() -> Result<(), Box<dyn Error>> {
    // Library diagnostics at debug, everything else at info.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,metric_views=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_thread_names(true))
        .init();

    let config = ViewsConfig::from_yaml(VIEWS)?;
    let meter_provider = init_meter_provider(&config)?;
    let meter = meter_provider.meter(METER_NAME);
    let attributes = [KeyValue::new("A", "B"), KeyValue::new("C", "D")];

    let bar = meter
        .f64_histogram("custom_histogram")
        .with_description("a histogram with custom buckets and rename")
        .build()?;
    for value in [136.0, 64.0, 701.0, 830.0] {
        bar.record(value, &attributes)?;
    }

    let joe = meter
        .f64_histogram("custom_histogram1")
        .with_description("a histogram with custom buckets and rename")
        .build()?;
    let tony = meter
        .f64_histogram("custom_histogram2")
        .with_description("a histogram with custom buckets and rename")
        .build()?;
    for value in [4.0, 8.0, 12.0, 16.0] {
        joe.record(value, &attributes)?;
        tony.record(value, &attributes)?;
    }

    // The periodic reader would only export after its 10s interval, flushing
    // exports right away.
    meter_provider.force_flush()?;
    meter_provider.shutdown()?;
    Ok(())
}
