//! End to end: views applied by a provider, exported by a periodic reader.

use std::time::Duration;

use metric_views::{
    metrics::{
        data::{AggregatedMetrics, CollectedMetrics, HistogramDataPoint, MetricData},
        Aggregation, InMemoryMetricExporter, InMemoryMetricExporterBuilder, PeriodicReader,
        SdkMeterProvider, Stream, Temporality, ViewRule,
    },
    KeyValue, MetricError,
};

const METER_NAME: &str = "github.com/open-telemetry/opentelemetry-go/example/view";

fn histogram_view(instrument: &'static str, stream: &'static str, boundaries: &[f64]) -> ViewRule {
    ViewRule::builder()
        .with_scope_name(METER_NAME)
        .with_instrument_name(instrument)
        .with_stream(
            Stream::builder()
                .with_name(stream)
                .with_aggregation(Aggregation::ExplicitBucketHistogram {
                    boundaries: boundaries.to_vec(),
                    record_min_max: true,
                })
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

fn provider(exporter: &InMemoryMetricExporter) -> SdkMeterProvider {
    let reader = PeriodicReader::builder(exporter.clone())
        .with_interval(Duration::from_secs(3600))
        .build();
    SdkMeterProvider::builder()
        .with_reader(reader)
        .with_view(histogram_view(
            "custom_histogram",
            "bar",
            &[64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0],
        ))
        .with_view(histogram_view(
            "custom_histogram1",
            "joe",
            &[5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0],
        ))
        .with_view(histogram_view(
            "custom_histogram2",
            "tony",
            &[4.0, 8.0, 12.0, 16.0, 24.0, 28.0, 32.0],
        ))
        .build()
}

fn histogram_point<'a>(batch: &'a CollectedMetrics, name: &str) -> &'a HistogramDataPoint<f64> {
    let metric = batch
        .find(name)
        .unwrap_or_else(|| panic!("no metric named {name}"));
    match &metric.data {
        AggregatedMetrics::F64(MetricData::Histogram(hist)) => {
            assert_eq!(hist.data_points.len(), 1);
            &hist.data_points[0]
        }
        other => panic!("unexpected data {other:?}"),
    }
}

#[test]
fn renamed_histograms_are_exported() {
    let exporter = InMemoryMetricExporter::default();
    let provider = provider(&exporter);
    let meter = provider.meter(METER_NAME);
    let attrs = [KeyValue::new("A", "B"), KeyValue::new("C", "D")];

    let bar = meter.f64_histogram("custom_histogram").build().unwrap();
    let joe = meter.f64_histogram("custom_histogram1").build().unwrap();
    let tony = meter.f64_histogram("custom_histogram2").build().unwrap();
    for value in [136.0, 64.0, 701.0, 830.0] {
        bar.record(value, &attrs).unwrap();
    }
    for value in [4.0, 8.0, 12.0, 16.0] {
        joe.record(value, &attrs).unwrap();
        tony.record(value, &attrs).unwrap();
    }

    provider.force_flush().unwrap();
    let batches = exporter.get_finished_metrics().unwrap();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.scope_metrics.len(), 1);
    assert_eq!(batch.scope_metrics[0].scope.name(), METER_NAME);
    assert_eq!(batch.metrics().count(), 3);

    let bar = histogram_point(batch, "bar");
    assert_eq!(bar.bucket_counts, vec![0, 1, 1, 0, 2, 0, 0, 0]);
    assert_eq!(bar.sum, 1731.0);
    assert_eq!(bar.min, Some(64.0));
    assert_eq!(bar.max, Some(830.0));
    assert_eq!(bar.attributes, attrs.to_vec());

    let joe = histogram_point(batch, "joe");
    assert_eq!(joe.bucket_counts, vec![1, 1, 1, 1, 0, 0, 0, 0]);
    assert_eq!(joe.sum, 40.0);

    let tony = histogram_point(batch, "tony");
    assert_eq!(tony.bucket_counts, vec![0, 1, 1, 1, 1, 0, 0, 0]);
    assert_eq!(tony.count, 4);

    provider.shutdown().unwrap();
}

#[test]
fn cumulative_export_keeps_accumulating() {
    let exporter = InMemoryMetricExporter::default();
    let provider = provider(&exporter);
    let bar = provider
        .meter(METER_NAME)
        .f64_histogram("custom_histogram")
        .build()
        .unwrap();

    bar.record(100.0, &[]).unwrap();
    provider.force_flush().unwrap();
    bar.record(200.0, &[]).unwrap();
    provider.force_flush().unwrap();

    let batches = exporter.get_finished_metrics().unwrap();
    assert_eq!(batches.len(), 2);
    let second = histogram_point(&batches[1], "bar");
    assert_eq!(second.count, 2);
    assert_eq!(second.sum, 300.0);
}

#[test]
fn delta_exporter_resets_each_cycle() {
    let exporter = InMemoryMetricExporterBuilder::new()
        .with_temporality(Temporality::Delta)
        .build();
    let provider = provider(&exporter);
    let bar = provider
        .meter(METER_NAME)
        .f64_histogram("custom_histogram")
        .build()
        .unwrap();

    bar.record(100.0, &[]).unwrap();
    provider.force_flush().unwrap();
    bar.record(200.0, &[]).unwrap();
    provider.force_flush().unwrap();

    let batches = exporter.get_finished_metrics().unwrap();
    let second = histogram_point(&batches[1], "bar");
    assert_eq!(second.count, 1);
    assert_eq!(second.sum, 200.0);
    assert_eq!(second.bucket_counts, vec![0, 0, 1, 0, 0, 0, 0, 0]);
}

#[test]
fn shutdown_exports_pending_measurements() {
    let exporter = InMemoryMetricExporter::default();
    let provider = provider(&exporter);
    let joe = provider
        .meter(METER_NAME)
        .f64_histogram("custom_histogram1")
        .build()
        .unwrap();
    joe.record(7.0, &[]).unwrap();

    provider.shutdown().unwrap();
    let batches = exporter.get_finished_metrics().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(histogram_point(&batches[0], "joe").count, 1);

    assert!(matches!(joe.record(8.0, &[]), Err(MetricError::AlreadyShutdown)));
    assert_eq!(provider.dropped_measurements(), 1);
}

#[test]
fn other_scope_keeps_default_buckets() {
    let exporter = InMemoryMetricExporter::default();
    let provider = provider(&exporter);
    let histogram = provider
        .meter("another-scope")
        .f64_histogram("custom_histogram")
        .build()
        .unwrap();
    histogram.record(7.0, &[]).unwrap();

    provider.force_flush().unwrap();
    let batches = exporter.get_finished_metrics().unwrap();
    let point = histogram_point(&batches[0], "custom_histogram");
    assert_eq!(
        point.bounds,
        vec![
            0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0,
            5000.0, 7500.0, 10000.0
        ]
    );
    assert_eq!(point.bucket_counts[2], 1);
    provider.shutdown().unwrap();
}
