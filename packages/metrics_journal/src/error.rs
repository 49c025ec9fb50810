use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when setting up a metrics journal or looking up registered metrics.
///
/// Evaluating, rendering and resetting a metric never fails, so none of these errors can
/// surface from a logging pass over a set of metrics.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller asked for a metric at an index that has not been assigned yet.
    #[error("metric index {index} is out of range, the registry holds {len} metrics")]
    IndexOutOfRange {
        /// The index the caller asked for.
        index: usize,

        /// The number of metrics in the registry at the time of the lookup.
        len: usize,
    },

    /// The metric at the requested index exists but is not of the requested type.
    #[error(
        "type inconsistency for metric at index {index}: expected type {expected}, actual type {actual}"
    )]
    TypeMismatch {
        /// The index the caller asked for.
        index: usize,

        /// Name of the type the caller asked for.
        expected: &'static str,

        /// Name of the type actually stored at the index.
        actual: &'static str,
    },

    /// The writer could not open its sink file for appending.
    #[error("failed to open log sink '{}': {source}", path.display())]
    SinkOpen {
        /// Path of the sink file.
        path: PathBuf,

        /// The underlying I/O error.
        source: io::Error,
    },

    /// The operating system refused to start the writer's consumer thread.
    #[error("failed to start the log writer thread: {source}")]
    WriterThreadSpawn {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The histogram backend rejected the requested configuration.
    #[error("failed to create latency histogram: {reason}")]
    HistogramCreation {
        /// A human-readable description of the problem.
        reason: String,
    },
}

/// A specialized `Result` type for metrics journal operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
