//! Grouping of solution records into deduplicated buckets.
//!
//! A record lands in up to three groupings (writes, reads, exceptions). Each
//! bucket counts distinct crashing inputs, so several metadata variants of
//! the same input only count once. Buckets and their members keep the order
//! in which they were first seen.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use mailbox_core::{RawInput, RawInputLayout};

use crate::config::{ClassifierConfig, ConfigError};
use crate::content_key::ContentKey;
use crate::metadata::{AccessCatch, LoadedRun, MailboxPointer, MetadataRecord};
use crate::validate::ValidationInput;

/// Source name used for raw input diagnostics.
pub const RAW_INPUT_SOURCE: &str = "raw-input";

/// One component of a bucket key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    /// Program counter of the faulting instruction.
    ProgramCounter(u64),
    /// Faulting address.
    FaultingAddress(u64),
    /// CPU exception name.
    ExceptionKind(String),
    /// Link register at exception time.
    LinkRegister(u64),
    /// Mailbox command id decoded from the raw input.
    CommandId(u8),
}

impl KeyPart {
    /// Column label used by the summary report.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ProgramCounter(_) => "PC",
            Self::FaultingAddress(_) => "Location",
            Self::ExceptionKind(_) => "Exception",
            Self::LinkRegister(_) => "LR",
            Self::CommandId(_) => "CommandID",
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgramCounter(value) | Self::FaultingAddress(value) => write!(f, "{value:#x}"),
            Self::LinkRegister(value) => write!(f, "{value:#010x}"),
            Self::CommandId(id) => write!(f, "{id:#x}"),
            Self::ExceptionKind(kind) => f.write_str(kind),
        }
    }
}

/// Two-level grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// Outer key (program counter or exception kind).
    pub primary: KeyPart,
    /// Inner key (address, command id or link register).
    pub secondary: KeyPart,
}

/// Distinct crashing inputs sharing one [`BucketKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    members: IndexMap<ContentKey, PathBuf>,
}

impl Bucket {
    /// Adds a member; returns false when the content key was already present.
    pub fn insert(&mut self, key: ContentKey, artifact: PathBuf) -> bool {
        match self.members.entry(key) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(artifact);
                true
            }
        }
    }

    /// Number of distinct crashing inputs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// First inserted artifact.
    #[must_use]
    pub fn exemplar(&self) -> Option<&Path> {
        self.members.values().next().map(PathBuf::as_path)
    }

    /// Members in insertion order.
    pub fn members(&self) -> impl Iterator<Item = (&ContentKey, &Path)> {
        self.members.iter().map(|(key, path)| (key, path.as_path()))
    }
}

/// Buckets in first-seen order.
pub type Grouping = IndexMap<BucketKey, Bucket>;

/// A soft problem found while classifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Metadata file the problem relates to.
    pub path: PathBuf,
    /// Validator name, or [`RAW_INPUT_SOURCE`].
    pub source: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path.display(), self.source, self.message)
    }
}

/// Result of classifying one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Whether access buckets are keyed by command id.
    pub binary: bool,
    /// Write violations by (PC, location or command id).
    pub writes: Grouping,
    /// Read violations by (PC, location or command id).
    pub reads: Grouping,
    /// Exceptions by (kind, LR).
    pub exceptions: Grouping,
    /// Command ids of every decoded raw input.
    pub crashing_commands: BTreeSet<u8>,
    /// Low nibble of the mailbox pointer of exception records.
    pub exception_pointer_nibbles: BTreeSet<u8>,
    /// Non-zero mailbox pointers in record order.
    pub mailbox_pointers: Vec<MailboxPointer>,
    /// Validator and raw input problems.
    pub diagnostics: Vec<Diagnostic>,
}

impl Classification {
    /// Total number of buckets across all groupings.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.writes.len() + self.reads.len() + self.exceptions.len()
    }
}

/// Groups loaded records according to a [`ClassifierConfig`].
#[derive(Debug)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    /// Creates a classifier after validating its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is inconsistent.
    pub fn new(config: ClassifierConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies every record of a run.
    #[must_use]
    pub fn classify(&self, run: &LoadedRun) -> Classification {
        let layout = self.config.cross_reference.layout();
        let mut classification = Classification {
            binary: layout.is_some(),
            ..Classification::default()
        };
        let mut raw_inputs: HashMap<ContentKey, Option<RawInput>> = HashMap::new();

        for record in &run.records {
            let artifact = self
                .config
                .convention
                .artifact_path(&run.dir, &record.content_key);

            let raw_input = layout.and_then(|layout| {
                *raw_inputs
                    .entry(record.content_key.clone())
                    .or_insert_with(|| {
                        read_raw_input(layout, &artifact)
                            .map_err(|message| {
                                classification.diagnostics.push(Diagnostic {
                                    path: record.source_path.clone(),
                                    source: RAW_INPUT_SOURCE,
                                    message,
                                });
                            })
                            .ok()
                    })
            });

            if let Some(raw) = &raw_input {
                classification.crashing_commands.insert(raw.command.command_id);
            }

            let access_key = |catch: AccessCatch| BucketKey {
                primary: KeyPart::ProgramCounter(catch.program_counter),
                secondary: raw_input.map_or(KeyPart::FaultingAddress(catch.location), |raw| {
                    KeyPart::CommandId(raw.command.command_id)
                }),
            };

            if let Some(catch) = record.write_catch {
                add(&mut classification.writes, access_key(catch), record, &artifact);
            }
            if let Some(catch) = record.read_catch {
                add(&mut classification.reads, access_key(catch), record, &artifact);
            }
            if let Some(exception) = &record.exception {
                let key = BucketKey {
                    primary: KeyPart::ExceptionKind(exception.kind.clone()),
                    secondary: KeyPart::LinkRegister(exception.link_register),
                };
                add(&mut classification.exceptions, key, record, &artifact);

                if let Some(pointer) = record.misc_pointer {
                    classification
                        .exception_pointer_nibbles
                        .insert(pointer.lower.to_le_bytes()[0] & 0xF);
                }
            }

            if let Some(pointer) = record.misc_pointer.filter(|p| !p.is_null()) {
                classification.mailbox_pointers.push(pointer);
            }

            self.run_validators(record, raw_input.as_ref(), &mut classification.diagnostics);
        }

        tracing::debug!(
            records = run.records.len(),
            buckets = classification.bucket_count(),
            diagnostics = classification.diagnostics.len(),
            "classified run"
        );

        classification
    }

    fn run_validators(
        &self,
        record: &MetadataRecord,
        raw_input: Option<&RawInput>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let input = ValidationInput { record, raw_input };

        for validator in &self.config.validators {
            if validator.requires_raw_input() && raw_input.is_none() {
                continue;
            }
            if let Some(message) = validator.check(&input) {
                diagnostics.push(Diagnostic {
                    path: record.source_path.clone(),
                    source: validator.name(),
                    message,
                });
            }
        }
    }
}

fn add(grouping: &mut Grouping, key: BucketKey, record: &MetadataRecord, artifact: &Path) {
    grouping
        .entry(key)
        .or_default()
        .insert(record.content_key.clone(), artifact.to_path_buf());
}

fn read_raw_input(layout: RawInputLayout, artifact: &Path) -> Result<RawInput, String> {
    let bytes = fs::read(artifact)
        .map_err(|error| format!("cannot read {}: {error}", artifact.display()))?;
    layout
        .parse(&bytes)
        .map_err(|error| format!("{}: {error}", artifact.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ExceptionInfo;

    fn record(key: &str, variant: u32) -> MetadataRecord {
        MetadataRecord {
            source_path: PathBuf::from(format!(".{key}_{variant}.metadata")),
            content_key: ContentKey::new(key),
            access_schema: None,
            write_catch: None,
            read_catch: None,
            exception: None,
            misc_pointer: None,
            mailbox_word: None,
        }
    }

    fn run(records: Vec<MetadataRecord>) -> LoadedRun {
        LoadedRun {
            dir: PathBuf::from("solutions"),
            records,
            warnings: Vec::new(),
        }
    }

    fn classifier() -> Classifier {
        Classifier::new(ClassifierConfig::default()).expect("default config is valid")
    }

    fn write_at(key: &str, variant: u32, pc: u64, location: u64) -> MetadataRecord {
        MetadataRecord {
            write_catch: Some(AccessCatch {
                location,
                program_counter: pc,
            }),
            ..record(key, variant)
        }
    }

    #[test]
    fn bucket_ignores_duplicate_members() {
        let mut bucket = Bucket::default();
        assert!(bucket.insert(ContentKey::new("a"), PathBuf::from("d/a")));
        assert!(bucket.insert(ContentKey::new("b"), PathBuf::from("d/b")));
        assert!(!bucket.insert(ContentKey::new("a"), PathBuf::from("d/other")));
        assert_eq!(bucket.count(), 2);
        assert_eq!(bucket.exemplar(), Some(Path::new("d/a")));
    }

    #[test]
    fn buckets_keep_first_seen_order() {
        let result = classifier().classify(&run(vec![
            write_at("b", 0, 0x20, 0x1000),
            write_at("a", 0, 0x10, 0x1000),
            write_at("c", 0, 0x20, 0x1000),
        ]));

        let primaries: Vec<_> = result.writes.keys().map(|k| k.primary.clone()).collect();
        assert_eq!(
            primaries,
            vec![KeyPart::ProgramCounter(0x20), KeyPart::ProgramCounter(0x10)]
        );
        let first = &result.writes[0];
        assert_eq!(first.count(), 2);
        assert_eq!(first.exemplar(), Some(Path::new("solutions/b")));
    }

    #[test]
    fn exception_records_feed_nibbles_and_pointers() {
        let exception = MetadataRecord {
            exception: Some(ExceptionInfo {
                kind: "DATAB".to_string(),
                link_register: 0xABCD,
            }),
            misc_pointer: Some(MailboxPointer {
                lower: 0x1236,
                higher: 0,
            }),
            ..record("x", 0)
        };
        let null_pointer = MetadataRecord {
            misc_pointer: Some(MailboxPointer::default()),
            ..record("y", 0)
        };

        let result = classifier().classify(&run(vec![exception, null_pointer]));

        assert_eq!(result.exceptions.len(), 1);
        let (key, bucket) = result.exceptions.first().expect("one bucket");
        assert_eq!(key.primary, KeyPart::ExceptionKind("DATAB".to_string()));
        assert_eq!(key.secondary.to_string(), "0x0000abcd");
        assert_eq!(bucket.count(), 1);
        assert_eq!(
            result.exception_pointer_nibbles.iter().copied().collect::<Vec<_>>(),
            vec![0x6]
        );
        assert_eq!(result.mailbox_pointers.len(), 1);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn location_mode_never_reads_artifacts() {
        let result = classifier().classify(&run(vec![write_at("missing", 0, 1, 2)]));
        assert!(!result.binary);
        assert!(result.crashing_commands.is_empty());
        assert!(result.diagnostics.is_empty());
        assert_eq!(
            result.writes.keys().next().map(|k| k.secondary.clone()),
            Some(KeyPart::FaultingAddress(2))
        );
    }

    #[test]
    fn key_part_labels() {
        assert_eq!(KeyPart::ProgramCounter(0).label(), "PC");
        assert_eq!(KeyPart::FaultingAddress(0).label(), "Location");
        assert_eq!(KeyPart::CommandId(5).label(), "CommandID");
        assert_eq!(KeyPart::CommandId(5).to_string(), "0x5");
    }
}
