//! Triage of ASP fuzzing solutions.
//!
//! Loads the metadata files of a solutions directory, groups them into
//! deduplicated buckets and renders text reports.

use clap as _;
use tracing_subscriber as _;

/// Deduplication keys and solution file naming.
pub mod content_key;
pub use content_key::{ContentKey, ContentKeyConvention};

/// Classifier configuration.
pub mod config;
pub use config::{ClassifierConfig, ConfigError, CrossReference};

/// Metadata file schema and batch loading.
pub mod metadata;
pub use metadata::{
    load_record, load_run, AccessCatch, AccessSchema, ExceptionInfo, LoadWarning, LoadedRun,
    MailboxPointer, MetadataError, MetadataRecord, ParsedRecord,
};

/// Optional per-record sanity checks.
pub mod validate;
pub use validate::{ExceptionCommandCheck, RecordValidator, UnalignedPointerCheck, ValidationInput};

/// Bucket grouping.
pub mod aggregate;
pub use aggregate::{Bucket, BucketKey, Classification, Classifier, Diagnostic, Grouping, KeyPart};

/// Report rendering.
pub mod report;
pub use report::{write_report, ReportMode};

/// Hard failures.
pub mod errors;
pub use errors::TriageError;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use tempfile as _;
