//! # Reader configuration module
//!
//! Settings of the reader that collects the configured views.

use std::time::Duration;

use metric_views::metrics::{
    ManualReader, PeriodicReader, PeriodicReaderBuilder, PushMetricExporter, Temporality,
};
use serde::Deserialize;

use crate::ConfigError;

/// Reader settings. Without a `periodic` section the application is
/// expected to collect on demand through a [ManualReader].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReaderConfig {
    pub periodic: Option<PeriodicReaderConfig>,
    pub temporality: Option<TemporalityConfig>,
}

/// Export cadence of a [PeriodicReader]. Unset values fall back to the
/// `OTEL_METRIC_EXPORT_*` environment variables, then to the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeriodicReaderConfig {
    pub interval_millis: Option<u64>,
    pub timeout_millis: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalityConfig {
    Cumulative,
    Delta,
}

impl From<TemporalityConfig> for Temporality {
    fn from(value: TemporalityConfig) -> Self {
        match value {
            TemporalityConfig::Cumulative => Temporality::Cumulative,
            TemporalityConfig::Delta => Temporality::Delta,
        }
    }
}

impl ReaderConfig {
    /// Configured temporality, cumulative when unset.
    pub fn temporality(&self) -> Temporality {
        self.temporality.map(Into::into).unwrap_or_default()
    }

    /// A [ManualReader] with the configured temporality.
    pub fn manual_reader(&self) -> ManualReader {
        ManualReader::builder()
            .with_temporality(self.temporality())
            .build()
    }

    /// A [PeriodicReader] exporting to `exporter` at the configured cadence.
    ///
    /// The temporality of a periodic reader is the exporter's, so a
    /// `temporality` next to `periodic` is rejected.
    pub fn periodic_reader<E: PushMetricExporter>(
        &self,
        exporter: E,
    ) -> Result<PeriodicReader<E>, ConfigError> {
        self.validate()?;
        let mut builder: PeriodicReaderBuilder<E> = PeriodicReader::builder(exporter);
        if let Some(periodic) = &self.periodic {
            if let Some(interval) = periodic.interval_millis {
                builder = builder.with_interval(Duration::from_millis(interval));
            }
            if let Some(timeout) = periodic.timeout_millis {
                builder = builder.with_timeout(Duration::from_millis(timeout));
            }
        }
        Ok(builder.build())
    }

    /// Rejects settings that cannot take effect together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.periodic.is_some() && self.temporality.is_some() {
            return Err(ConfigError::Reader(
                "temporality applies to manual readers only, a periodic reader uses its exporter's temporality",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_defaults_to_cumulative() {
        let config: ReaderConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.periodic.is_none());
        assert_eq!(config.temporality(), Temporality::Cumulative);
    }

    #[test]
    fn periodic_section_is_parsed() {
        let config: ReaderConfig = serde_yaml::from_str(
            r#"
            periodic:
              interval_millis: 10000
              timeout_millis: 500
            "#,
        )
        .unwrap();
        let periodic = config.periodic.as_ref().unwrap();
        assert_eq!(periodic.interval_millis, Some(10_000));
        assert_eq!(periodic.timeout_millis, Some(500));
        assert_eq!(config.temporality(), Temporality::Cumulative);
    }

    #[test]
    fn manual_section_takes_temporality() {
        let config: ReaderConfig = serde_yaml::from_str("temporality: delta").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.temporality(), Temporality::Delta);
    }

    #[test]
    fn unknown_temporality_is_rejected() {
        assert!(serde_yaml::from_str::<ReaderConfig>("temporality: low_memory").is_err());
    }

    #[test]
    fn temporality_with_periodic_is_rejected() {
        let config: ReaderConfig = serde_yaml::from_str(
            r#"
            periodic:
              interval_millis: 1000
            temporality: delta
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Reader(_))));
        assert!(matches!(
            config.periodic_reader(metric_views::metrics::InMemoryMetricExporter::default()),
            Err(ConfigError::Reader(_))
        ));
    }

    #[test]
    fn periodic_reader_without_temporality_builds() {
        let config: ReaderConfig =
            serde_yaml::from_str("periodic: { interval_millis: 1000 }").unwrap();
        assert!(config.validate().is_ok());
    }
}
