//! # Declarative view configuration
//!
//! Describes the views and the reader of a [`SdkMeterProvider`] in YAML:
//!
//! ```yaml
//! views:
//!   - selector:
//!       meter_name: my-service
//!       instrument_name: custom_histogram
//!     stream:
//!       name: bar
//!       aggregation:
//!         explicit_bucket_histogram:
//!           boundaries: [64, 128, 256, 512]
//! reader:
//!   periodic:
//!     interval_millis: 10000
//! ```
//!
//! Views are applied in document order, the first matching view wins. The
//! reader section holds either `periodic` settings or, for a manual reader,
//! a `temporality`.
//!
//! [`SdkMeterProvider`]: metric_views::metrics::SdkMeterProvider

pub mod reader_config;
pub mod views;

use std::path::Path;

use metric_views::{
    metrics::{MeterProviderBuilder, ViewRule},
    MetricError,
};
use serde::Deserialize;
use thiserror::Error;

pub use reader_config::{PeriodicReaderConfig, ReaderConfig, TemporalityConfig};
pub use views::{AggregationConfig, InstrumentTypeConfig, SelectorConfig, StreamConfig, ViewConfig};

/// Errors raised while loading or applying a configuration document.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not valid YAML or does not match the schema.
    #[error("invalid configuration document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The configuration file could not be read.
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
    /// The reader section combines settings that cannot apply together.
    #[error("invalid reader configuration: {0}")]
    Reader(&'static str),
    /// A view or stream in the document is rejected by `metric_views`.
    #[error("view {index}: {source}")]
    View {
        /// Position of the view in the document.
        index: usize,
        /// Why the view was rejected.
        #[source]
        source: MetricError,
    },
}

/// The root of a configuration document.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewsConfig {
    /// Views in evaluation order.
    #[serde(default)]
    pub views: Vec<ViewConfig>,

    /// Reader settings.
    #[serde(default)]
    pub reader: ReaderConfig,
}

impl ViewsConfig {
    /// Parses a configuration document.
    pub fn from_yaml(yaml_str: &str) -> Result<Self, ConfigError> {
        let config: ViewsConfig = serde_yaml::from_str(yaml_str)?;
        config.reader.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml_str)
    }

    /// Builds the view rules, in document order.
    ///
    /// Fails on the first view that `metric_views` rejects, for example one
    /// without any selector or with unsorted bucket boundaries.
    pub fn view_rules(&self) -> Result<Vec<ViewRule>, ConfigError> {
        self.views
            .iter()
            .enumerate()
            .map(|(index, view)| {
                view.to_view_rule()
                    .map_err(|source| ConfigError::View { index, source })
            })
            .collect()
    }

    /// Appends every configured view to `builder`.
    pub fn apply_views(
        &self,
        builder: MeterProviderBuilder,
    ) -> Result<MeterProviderBuilder, ConfigError> {
        Ok(self
            .view_rules()?
            .into_iter()
            .fold(builder, |builder, view| builder.with_view(view)))
    }
}
