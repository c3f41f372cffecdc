//! Solution metadata loading.
//!
//! Each objective found by the fuzzer is stored with a JSON metadata file:
//!
//! ```text
//! { "metadata": { "map": { "<namespaced type>": [<type id>, <payload or null>], ... } } }
//! ```
//!
//! Only a handful of payload types matter for triage. Absent or null payloads
//! simply leave the corresponding sub-record empty. A payload that is present
//! but malformed leaves only its own sub-record empty and is reported as an
//! issue next to the record. Only a broken document or a missing
//! `metadata.map` fails the whole file. The batch loader turns both kinds of
//! failure into [`LoadWarning`]s and moves on.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::content_key::{ContentKey, ContentKeyConvention};
use crate::errors::TriageError;

/// Type name of the exception handler payload.
pub const EXCEPTION_HANDLER_TYPE: &str = "libasp::exception_handler::ExceptionHandlerMetadata";
/// Type name of the miscellaneous emulator payload carrying mailbox values.
pub const MISC_TYPE: &str = "libasp::emulator_module::MiscMetadata";

/// Schema generations of the access-violation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessSchema {
    /// Current access observer (reads and writes).
    AccessObserver,
    /// Legacy write catcher, kept for older runs.
    WriteCatcher,
}

impl AccessSchema {
    /// Lookup order, newest first.
    pub const LOOKUP_ORDER: [Self; 2] = [Self::AccessObserver, Self::WriteCatcher];

    /// Namespaced type name used as the map key.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::AccessObserver => "libasp::bindings::AccessObserverMetadata",
            Self::WriteCatcher => "libasp::bindings::WriteCatcherMetadata",
        }
    }
}

/// An access violation caught by the access observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessCatch {
    /// Faulting physical address.
    pub location: u64,
    /// Program counter of the faulting instruction.
    pub program_counter: u64,
}

/// A CPU exception raised during the test case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExceptionInfo {
    /// Exception name, e.g. `DATAB`.
    pub kind: String,
    /// Link register at the time of the exception.
    pub link_register: u64,
}

/// Mailbox buffer pointer observed when the objective fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MailboxPointer {
    /// Lower 32 bits.
    pub lower: u32,
    /// Upper 32 bits.
    pub higher: u32,
}

impl MailboxPointer {
    /// Full 64-bit pointer.
    #[must_use]
    pub const fn full(self) -> u64 {
        ((self.higher as u64) << 32) | self.lower as u64
    }

    /// True when both halves are zero.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.lower == 0 && self.higher == 0
    }
}

impl fmt::Display for MailboxPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} {:#x}", self.lower, self.higher)
    }
}

/// One parsed metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// File the record was read from.
    pub source_path: PathBuf,
    /// Deduplication key of the underlying crashing input.
    pub content_key: ContentKey,
    /// Schema generation that supplied the access payload, if any.
    pub access_schema: Option<AccessSchema>,
    /// Caught write access.
    pub write_catch: Option<AccessCatch>,
    /// Caught read access.
    pub read_catch: Option<AccessCatch>,
    /// Triggered CPU exception.
    pub exception: Option<ExceptionInfo>,
    /// Mailbox pointer.
    pub misc_pointer: Option<MailboxPointer>,
    /// Mailbox command register, when the newer layout recorded it.
    pub mailbox_word: Option<u32>,
}

/// Why a metadata file, or one payload of it, could not be used.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The file could not be read.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    /// The file is not JSON or lacks `metadata.map`.
    #[error("malformed metadata document: {0}")]
    Document(#[from] serde_json::Error),
    /// A map entry is not a `[type, payload]` array.
    #[error("entry `{type_name}` is not a [type, payload] pair")]
    EntryShape {
        /// Offending map key.
        type_name: &'static str,
    },
    /// A payload is present but does not have the expected fields.
    #[error("payload `{type_name}` is malformed: {source}")]
    Payload {
        /// Offending map key.
        type_name: &'static str,
        /// Field-level error.
        source: serde_json::Error,
    },
    /// An exception was recorded without its link register.
    #[error("exception `{0}` has no registers.lr")]
    MissingLinkRegister(String),
    /// A register string is not a hexadecimal number.
    #[error("register value `{0}` is not a hexadecimal number")]
    BadRegister(String),
    /// The file name yields no content key.
    #[error("file name does not contain a content key")]
    NoContentKey,
}

/// A metadata file, or a payload of it, that was skipped.
#[derive(Debug)]
pub struct LoadWarning {
    /// Affected file.
    pub path: PathBuf,
    /// Reason.
    pub error: MetadataError,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not process {}: {}",
            self.path.display(),
            self.error
        )
    }
}

/// All records of one solutions directory.
#[derive(Debug, Default)]
pub struct LoadedRun {
    /// Solutions directory; raw inputs live next to the metadata.
    pub dir: PathBuf,
    /// Successfully parsed records, in file name order.
    pub records: Vec<MetadataRecord>,
    /// Skipped files and skipped payloads.
    pub warnings: Vec<LoadWarning>,
}

/// A parsed record together with the payloads that had to be dropped.
#[derive(Debug)]
pub struct ParsedRecord {
    /// Everything that could be decoded.
    pub record: MetadataRecord,
    /// One entry per malformed payload; its sub-record is left empty.
    pub issues: Vec<MetadataError>,
}

#[derive(Deserialize)]
struct MetadataDocument {
    metadata: MetadataSection,
}

#[derive(Deserialize)]
struct MetadataSection {
    map: Map<String, Value>,
}

#[derive(Deserialize)]
struct AccessPayload {
    caught_write: Option<(u64, u64)>,
    caught_read: Option<(u64, u64)>,
}

#[derive(Deserialize)]
struct ExceptionPayload {
    triggered_exception: Option<String>,
    registers: Option<RegisterFile>,
}

#[derive(Deserialize)]
struct RegisterFile {
    lr: Option<RegisterValue>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegisterValue {
    Number(u64),
    Text(String),
}

impl RegisterValue {
    fn to_u64(&self) -> Result<u64, MetadataError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Text(text) => {
                let digits = text
                    .trim()
                    .trim_start_matches("0x")
                    .trim_start_matches("0X");
                u64::from_str_radix(digits, 16)
                    .map_err(|_| MetadataError::BadRegister(text.clone()))
            }
        }
    }
}

#[derive(Deserialize)]
struct MiscPayload {
    ptr_lower: Option<u32>,
    ptr_higher: Option<u32>,
    mailbox_values: Option<MailboxValues>,
}

#[derive(Deserialize)]
struct MailboxValues {
    mbox: Option<u32>,
    ptr_lower: u32,
    ptr_higher: u32,
}

fn payload<'a>(
    map: &'a Map<String, Value>,
    type_name: &'static str,
) -> Result<Option<&'a Value>, MetadataError> {
    let Some(entry) = map.get(type_name) else {
        return Ok(None);
    };

    match entry.as_array().and_then(|pair| pair.get(1)) {
        Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(value)),
        None => Err(MetadataError::EntryShape { type_name }),
    }
}

fn decode_payload<'a, T: Deserialize<'a>>(
    value: &'a Value,
    type_name: &'static str,
) -> Result<T, MetadataError> {
    T::deserialize(value).map_err(|source| MetadataError::Payload { type_name, source })
}

const fn access_catch((location, program_counter): (u64, u64)) -> AccessCatch {
    AccessCatch {
        location,
        program_counter,
    }
}

fn decode_access(
    map: &Map<String, Value>,
) -> Result<Option<(AccessSchema, AccessPayload)>, MetadataError> {
    for schema in AccessSchema::LOOKUP_ORDER {
        if let Some(value) = payload(map, schema.type_name())? {
            return Ok(Some((schema, decode_payload(value, schema.type_name())?)));
        }
    }
    Ok(None)
}

fn decode_exception(map: &Map<String, Value>) -> Result<Option<ExceptionInfo>, MetadataError> {
    let Some(value) = payload(map, EXCEPTION_HANDLER_TYPE)? else {
        return Ok(None);
    };
    let exception: ExceptionPayload = decode_payload(value, EXCEPTION_HANDLER_TYPE)?;
    let Some(kind) = exception.triggered_exception else {
        return Ok(None);
    };
    let Some(lr) = exception.registers.and_then(|r| r.lr) else {
        return Err(MetadataError::MissingLinkRegister(kind));
    };

    Ok(Some(ExceptionInfo {
        link_register: lr.to_u64()?,
        kind,
    }))
}

fn decode_misc(
    map: &Map<String, Value>,
) -> Result<Option<(MailboxPointer, Option<u32>)>, MetadataError> {
    let Some(value) = payload(map, MISC_TYPE)? else {
        return Ok(None);
    };
    let misc: MiscPayload = decode_payload(value, MISC_TYPE)?;

    if let Some(values) = misc.mailbox_values {
        let pointer = MailboxPointer {
            lower: values.ptr_lower,
            higher: values.ptr_higher,
        };
        return Ok(Some((pointer, values.mbox)));
    }

    if misc.ptr_lower.is_none() && misc.ptr_higher.is_none() {
        return Ok(None);
    }
    let pointer = MailboxPointer {
        lower: misc.ptr_lower.unwrap_or(0),
        higher: misc.ptr_higher.unwrap_or(0),
    };
    Ok(Some((pointer, None)))
}

fn settle<T>(
    decoded: Result<Option<T>, MetadataError>,
    issues: &mut Vec<MetadataError>,
) -> Option<T> {
    decoded.unwrap_or_else(|error| {
        issues.push(error);
        None
    })
}

impl MetadataRecord {
    /// Parses a metadata document.
    ///
    /// Each payload is decoded on its own: a malformed one is returned in
    /// [`ParsedRecord::issues`] and the other sub-records are still filled.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] for invalid JSON or a missing `metadata.map`.
    pub fn from_slice(
        bytes: &[u8],
        source_path: PathBuf,
        content_key: ContentKey,
    ) -> Result<ParsedRecord, MetadataError> {
        let document: MetadataDocument = serde_json::from_slice(bytes)?;
        let map = &document.metadata.map;
        let mut issues = Vec::new();

        let access = settle(decode_access(map), &mut issues);
        let exception = settle(decode_exception(map), &mut issues);
        let misc = settle(decode_misc(map), &mut issues);

        let record = Self {
            source_path,
            content_key,
            access_schema: access.as_ref().map(|(schema, _)| *schema),
            write_catch: access
                .as_ref()
                .and_then(|(_, payload)| payload.caught_write)
                .map(access_catch),
            read_catch: access
                .as_ref()
                .and_then(|(_, payload)| payload.caught_read)
                .map(access_catch),
            exception,
            misc_pointer: misc.map(|(pointer, _)| pointer),
            mailbox_word: misc.and_then(|(_, word)| word),
        };

        Ok(ParsedRecord { record, issues })
    }

    /// True when the record carries no classifiable sub-record.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.write_catch.is_none() && self.read_catch.is_none() && self.exception.is_none()
    }
}

/// Loads one metadata file.
///
/// # Errors
///
/// Returns [`MetadataError`] when the file name yields no content key, the
/// file cannot be read, or it is not a metadata document.
pub fn load_record(
    path: &Path,
    convention: &ContentKeyConvention,
) -> Result<ParsedRecord, MetadataError> {
    let content_key = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| convention.derive(name))
        .ok_or(MetadataError::NoContentKey)?;

    let bytes = fs::read(path)?;
    MetadataRecord::from_slice(&bytes, path.to_path_buf(), content_key)
}

/// Loads every metadata file of a solutions directory.
///
/// Files are visited in file name order. A file that fails to load, and every
/// payload dropped from a file that did load, is reported in
/// [`LoadedRun::warnings`] without stopping the batch.
///
/// # Errors
///
/// Returns [`TriageError::ReadDir`] when the directory cannot be listed.
pub fn load_run(dir: &Path, convention: &ContentKeyConvention) -> Result<LoadedRun, TriageError> {
    let read_dir = |source| TriageError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir)? {
        let entry = entry.map_err(read_dir)?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if convention.is_metadata_file(&name) && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();

    let mut run = LoadedRun {
        dir: dir.to_path_buf(),
        ..LoadedRun::default()
    };

    for name in names {
        let path = dir.join(&name);
        match load_record(&path, convention) {
            Ok(parsed) => {
                run.warnings.extend(parsed.issues.into_iter().map(|error| LoadWarning {
                    path: path.clone(),
                    error,
                }));
                run.records.push(parsed.record);
            }
            Err(error) => run.warnings.push(LoadWarning { path, error }),
        }
    }

    tracing::debug!(
        dir = %dir.display(),
        records = run.records.len(),
        warnings = run.warnings.len(),
        "loaded solutions directory"
    );

    Ok(run)
}
