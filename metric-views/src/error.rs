use std::result;
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for metric operations.
pub type MetricResult<T> = result::Result<T, MetricError>;

/// Errors returned by the metrics pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetricError {
    /// Invalid stream, view or aggregation configuration, such as unsorted
    /// histogram boundaries or a view without match criteria.
    ///
    /// Raised while building views and instruments, never while recording.
    #[error("Config error {0}")]
    Config(String),
    /// Invalid instrument name or unit.
    #[error("Invalid instrument configuration: {0}")]
    InvalidInstrumentConfiguration(&'static str),
    /// An instrument was registered twice in the same scope with a different
    /// kind, unit or number type.
    #[error("Instrument conflict: {0}")]
    InstrumentConflict(String),
    /// The provider, reader or exporter has already been shut down.
    ///
    /// Measurements recorded after shutdown are dropped and this error is
    /// returned to the caller.
    #[error("Already shut down")]
    AlreadyShutdown,
    /// An operation did not finish within the allotted time.
    #[error("Operation timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
    /// Other errors not covered by specific cases.
    #[error("Metrics error: {0}")]
    Other(String),
}

impl<T> From<PoisonError<T>> for MetricError {
    fn from(err: PoisonError<T>) -> Self {
        MetricError::Other(err.to_string())
    }
}
