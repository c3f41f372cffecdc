//! Error type for statistics extraction and plotting.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the statistics tools.
#[derive(Debug, Error)]
pub enum StatsError {
    /// A file could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A snapshot file is not valid JSON of the expected shape.
    #[error("{}: malformed snapshot file: {source}", path.display())]
    Json {
        /// File involved.
        path: PathBuf,
        /// Parser error.
        source: serde_json::Error,
    },
    /// A line pattern failed to compile.
    #[error("invalid line pattern: {0}")]
    Pattern(#[from] regex::Error),
    /// Timeline parameters are unusable.
    #[error("invalid timeline configuration: {0}")]
    InvalidConfig(&'static str),
    /// There is nothing to plot.
    #[error("no data points")]
    NoData,
    /// The plotting backend failed.
    #[error("plotting failed: {0}")]
    Plot(String),
}

impl StatsError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
