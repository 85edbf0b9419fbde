//! Meter provider, views, aggregation and readers.
//!
//! ## Configuration
//!
//! The configuration lives in the [SdkMeterProvider]: an ordered list of
//! [View]s and a single [MetricReader], either a [ManualReader] collected on
//! demand or a [PeriodicReader] pushing to a [PushMetricExporter].
//!
//! ### Example
//!
//! ```
//! use metric_views::metrics::{Aggregation, ManualReader, SdkMeterProvider, Stream, ViewRule};
//! use metric_views::KeyValue;
//!
//! # fn main() -> Result<(), metric_views::MetricError> {
//! // Rename one histogram and give it its own buckets
//! let view = ViewRule::builder()
//!     .with_scope_name("my_app")
//!     .with_instrument_name("custom_histogram")
//!     .with_stream(
//!         Stream::builder()
//!             .with_name("bar")
//!             .with_aggregation(Aggregation::ExplicitBucketHistogram {
//!                 boundaries: vec![64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0],
//!                 record_min_max: true,
//!             })
//!             .build()?,
//!     )
//!     .build()?;
//!
//! let meter_provider = SdkMeterProvider::builder()
//!     .with_reader(ManualReader::default())
//!     .with_view(view)
//!     .build();
//!
//! let meter = meter_provider.meter("my_app");
//! let histogram = meter
//!     .f64_histogram("custom_histogram")
//!     .with_description("a histogram with custom buckets and rename")
//!     .build()?;
//!
//! histogram.record(136.0, &[KeyValue::new("A", "B"), KeyValue::new("C", "D")])?;
//!
//! // shutdown the provider at the end of the application so pending data
//! // reaches the reader.
//! meter_provider.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod aggregation;
pub mod data;
pub mod exporter;
pub(crate) mod instrument;
pub(crate) mod instruments;
pub(crate) mod internal;
pub(crate) mod manual_reader;
pub(crate) mod meter;
mod meter_provider;
pub(crate) mod periodic_reader;
pub(crate) mod pipeline;
pub mod reader;
pub(crate) mod view;

/// In-Memory metric exporter for testing purpose.
#[cfg(any(feature = "testing", test))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "testing", test))))]
pub mod in_memory_exporter;
#[cfg(any(feature = "testing", test))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "testing", test))))]
pub use in_memory_exporter::{InMemoryMetricExporter, InMemoryMetricExporterBuilder};

pub use aggregation::Aggregation;
pub use exporter::PushMetricExporter;
pub use instrument::{Instrument, InstrumentKind, Stream, StreamBuilder};
pub use instruments::{Counter, Gauge, Histogram, HistogramBuilder, InstrumentBuilder, UpDownCounter};
pub use manual_reader::{ManualReader, ManualReaderBuilder};
pub use meter::Meter;
pub use meter_provider::{MeterProviderBuilder, SdkMeterProvider};
pub use periodic_reader::{PeriodicReader, PeriodicReaderBuilder};
pub use pipeline::Pipeline;
pub use reader::MetricReader;
pub use view::{View, ViewRule, ViewRuleBuilder};

/// Defines the window that an aggregation was calculated over.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Temporality {
    /// A measurement interval that continues to expand forward in time from a
    /// starting point.
    ///
    /// New measurements are added to all previous measurements since a start time.
    #[default]
    Cumulative,

    /// A measurement interval that resets each cycle.
    ///
    /// Measurements from one cycle are recorded independently, measurements from
    /// other cycles do not affect them.
    Delta,
}
