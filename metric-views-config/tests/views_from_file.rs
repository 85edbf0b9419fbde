use std::io::Write;

use metric_views::{
    metrics::{
        data::{AggregatedMetrics, CollectedMetrics, MetricData},
        MetricReader, SdkMeterProvider, Temporality,
    },
    KeyValue,
};
use metric_views_config::{ConfigError, ViewsConfig};
use tempfile::NamedTempFile;

const METER_NAME: &str = "github.com/open-telemetry/opentelemetry-go/example/view";

const VIEWS_YAML: &str = r#"
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
      instrument_type: counter
    stream:
      attribute_keys: [A]
reader:
  temporality: delta
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn views_from_file_shape_histograms() {
    let file = write_config(VIEWS_YAML);
    let config = ViewsConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.views.len(), 3);
    assert_eq!(config.reader.temporality(), Temporality::Delta);

    let reader = config.reader.manual_reader();
    let provider = config
        .apply_views(SdkMeterProvider::builder().with_reader(reader.clone()))
        .unwrap()
        .build();
    let meter = provider.meter(METER_NAME);
    let attrs = [KeyValue::new("A", "B"), KeyValue::new("C", "D")];

    let bar = meter.f64_histogram("custom_histogram").build().unwrap();
    for value in [136.0, 64.0, 701.0, 830.0] {
        bar.record(value, &attrs).unwrap();
    }
    let requests = meter.u64_counter("requests").build().unwrap();
    requests.add(2, &attrs).unwrap();

    let mut collected = CollectedMetrics::default();
    reader.collect(&mut collected).unwrap();

    assert!(collected.find("custom_histogram").is_none());
    let AggregatedMetrics::F64(MetricData::Histogram(hist)) = &collected.find("bar").unwrap().data
    else {
        panic!("bar is not an f64 histogram");
    };
    assert_eq!(hist.temporality, Temporality::Delta);
    let dp = &hist.data_points[0];
    assert_eq!(dp.bucket_counts, vec![0, 1, 1, 0, 2, 0, 0, 0]);
    assert_eq!(dp.sum, 1731.0);

    let AggregatedMetrics::U64(MetricData::Sum(sum)) = &collected.find("requests").unwrap().data
    else {
        panic!("requests is not a u64 sum");
    };
    assert_eq!(sum.data_points[0].attributes, vec![KeyValue::new("A", "B")]);
    assert_eq!(sum.data_points[0].value, 2);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ViewsConfig::from_yaml_file(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn unknown_field_is_a_yaml_error() {
    let file = write_config("views: []\nexporters: {}\n");
    let result = ViewsConfig::from_yaml_file(file.path());
    assert!(matches!(result, Err(ConfigError::Yaml(_))));
}

#[test]
fn invalid_view_reports_its_position() {
    let config = ViewsConfig::from_yaml(
        r#"
        views:
          - selector:
              instrument_name: ok
          - selector:
              instrument_name: latency
            stream:
              aggregation:
                explicit_bucket_histogram:
                  boundaries: [10, 5]
        "#,
    )
    .unwrap();

    match config.view_rules() {
        Err(ConfigError::View { index, .. }) => assert_eq!(index, 1),
        other => panic!("expected a view error, got {other:?}"),
    }
}

#[test]
fn wildcard_rename_is_rejected() {
    let config = ViewsConfig::from_yaml(
        r#"
        views:
          - selector:
              instrument_name: "custom_*"
            stream:
              name: renamed
        "#,
    )
    .unwrap();

    assert!(matches!(
        config.view_rules(),
        Err(ConfigError::View { index: 0, .. })
    ));
}

#[test]
fn periodic_reader_with_temporality_is_rejected() {
    let result = ViewsConfig::from_yaml(
        r#"
        reader:
          periodic:
            interval_millis: 10000
          temporality: delta
        "#,
    );
    assert!(matches!(result, Err(ConfigError::Reader(_))));
}
