//! Hard failures of a triage run.
//!
//! Per-file problems never show up here: they are collected as
//! [`LoadWarning`](crate::metadata::LoadWarning)s and
//! [`Diagnostic`](crate::aggregate::Diagnostic)s instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop a triage run.
#[derive(Debug, Error)]
pub enum TriageError {
    /// The solutions directory could not be listed.
    #[error("cannot read solutions directory {}: {source}", path.display())]
    ReadDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The classifier configuration is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Writing the report failed.
    #[error("failed to write report: {0}")]
    Report(#[from] io::Error),
}
