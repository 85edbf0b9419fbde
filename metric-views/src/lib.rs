//! View resolution and explicit-bucket histogram aggregation for metric
//! instruments.
//!
//! A [`SdkMeterProvider`] owns an ordered list of views and one reader.
//! Every instrument created through one of its meters is resolved once
//! against the views: the first view that matches decides the stream name,
//! description, unit, aggregation and attribute filter. Measurements are
//! then aggregated per attribute set until a reader collects them.
//!
//! ```
//! use metric_views::metrics::{
//!     Aggregation, ManualReader, MetricReader, SdkMeterProvider, Stream, ViewRule,
//! };
//! use metric_views::metrics::data::CollectedMetrics;
//! use metric_views::KeyValue;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let view = ViewRule::builder()
//!     .with_instrument_name("request.latency")
//!     .with_stream(
//!         Stream::builder()
//!             .with_name("latency")
//!             .with_aggregation(Aggregation::ExplicitBucketHistogram {
//!                 boundaries: vec![64.0, 128.0, 256.0],
//!                 record_min_max: true,
//!             })
//!             .build()?,
//!     )
//!     .build()?;
//!
//! let reader = ManualReader::builder().build();
//! let provider = SdkMeterProvider::builder()
//!     .with_reader(reader.clone())
//!     .with_view(view)
//!     .build();
//!
//! let histogram = provider.meter("my-service").f64_histogram("request.latency").build()?;
//! histogram.record(136.0, &[KeyValue::new("route", "/")])?;
//!
//! let mut collected = CollectedMetrics::default();
//! reader.collect(&mut collected)?;
//! assert_eq!(collected.scope_metrics[0].metrics[0].name, "latency");
//! # Ok(())
//! # }
//! ```
//!
//! # Crate Feature Flags
//!
//! * `internal-logs` (enabled by default): emit internal diagnostics through
//!   `tracing`.
//! * `testing`: exposes [`metrics::InMemoryMetricExporter`].
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(clippy::needless_doctest_main)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod internal_logging;

mod common;
mod error;
pub mod metrics;

pub use common::{
    InstrumentationScope, InstrumentationScopeBuilder, Key, KeyValue, StringValue, Value,
};
pub use error::{MetricError, MetricResult};
pub use metrics::SdkMeterProvider;
