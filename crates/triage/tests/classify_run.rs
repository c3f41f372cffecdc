//! End-to-end classification of solutions directories built on disk.

#![allow(clippy::pedantic, clippy::nursery)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use clap as _;
use indexmap as _;
use mailbox_core::{ByteOrder, RawInputLayout};
use proptest::prelude::*;
use rstest::rstest;
use serde as _;
use serde_json::{json, Value};
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;
use triage::{
    load_run, write_report, AccessSchema, ClassifierConfig, Classifier, ContentKeyConvention,
    CrossReference, ExceptionCommandCheck, KeyPart, MetadataError, ReportMode,
    UnalignedPointerCheck,
};

fn write_metadata(dir: &Path, name: &str, map: Value) {
    let document = json!({ "metadata": { "map": map } });
    fs::write(dir.join(name), serde_json::to_vec(&document).unwrap()).unwrap();
}

fn write_access(dir: &Path, name: &str, pc: u64, location: u64) {
    write_metadata(
        dir,
        name,
        json!({
            "libasp::bindings::AccessObserverMetadata": [7, {
                "caught_write": [location, pc],
                "caught_read": null
            }]
        }),
    );
}

fn write_raw(dir: &Path, key: &str, command: u32, ptr_lower: u32, ptr_higher: u32) {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&command.to_le_bytes());
    bytes.extend_from_slice(&ptr_lower.to_le_bytes());
    bytes.extend_from_slice(&ptr_higher.to_le_bytes());
    fs::write(dir.join(key), bytes).unwrap();
}

fn classify(dir: &Path, config: ClassifierConfig) -> (triage::LoadedRun, triage::Classification) {
    let classifier = Classifier::new(config).unwrap();
    let run = load_run(dir, &classifier.config().convention).unwrap();
    let classification = classifier.classify(&run);
    (run, classification)
}

fn binary_config() -> ClassifierConfig {
    ClassifierConfig {
        cross_reference: CrossReference::Binary(RawInputLayout::new(0, ByteOrder::Little)),
        ..ClassifierConfig::default()
    }
}

#[test]
fn metadata_variants_of_one_input_count_once() {
    let temp = tempfile::tempdir().unwrap();
    write_access(temp.path(), ".aaaa_0.metadata", 0x100, 0x2000);
    write_access(temp.path(), ".aaaa_1.metadata", 0x100, 0x2000);
    write_access(temp.path(), ".bbbb_0.metadata", 0x100, 0x2000);

    let (run, result) = classify(temp.path(), ClassifierConfig::default());

    assert_eq!(run.records.len(), 3);
    assert_eq!(result.writes.len(), 1);
    let bucket = &result.writes[0];
    assert_eq!(bucket.count(), 2);
    assert_eq!(bucket.exemplar(), Some(temp.path().join("aaaa").as_path()));
}

#[test]
fn records_without_sub_records_are_loaded_but_not_bucketed() {
    let temp = tempfile::tempdir().unwrap();
    write_metadata(temp.path(), ".empty_0.metadata", json!({}));
    write_metadata(
        temp.path(),
        ".nulls_0.metadata",
        json!({
            "libasp::bindings::AccessObserverMetadata": [7, null],
            "libasp::exception_handler::ExceptionHandlerMetadata": [8, null],
            "libasp::emulator_module::MiscMetadata": [9, null]
        }),
    );
    write_metadata(
        temp.path(),
        ".readonly_0.metadata",
        json!({
            "libasp::bindings::WriteCatcherMetadata": [7, {
                "caught_write": null,
                "caught_read": [0x30, 0x40]
            }]
        }),
    );

    let (run, result) = classify(temp.path(), ClassifierConfig::default());

    assert!(run.warnings.is_empty());
    assert_eq!(run.records.len(), 3);
    assert_eq!(
        run.records
            .iter()
            .filter(|record| record.is_empty())
            .count(),
        2
    );
    assert_eq!(
        run.records[2].access_schema,
        Some(AccessSchema::WriteCatcher)
    );
    assert!(result.writes.is_empty());
    assert!(result.exceptions.is_empty());
    assert_eq!(result.reads.len(), 1);
    let key = result.reads.keys().next().unwrap();
    assert_eq!(key.primary, KeyPart::ProgramCounter(0x40));
    assert_eq!(key.secondary, KeyPart::FaultingAddress(0x30));
}

#[rstest]
#[case::truncated("{ \"metadata\": { \"map\": ")]
#[case::not_json("garbage")]
#[case::no_map("{ \"metadata\": {} }")]
fn malformed_files_become_warnings(#[case] content: &str) {
    let temp = tempfile::tempdir().unwrap();
    write_access(temp.path(), ".good_0.metadata", 0x10, 0x20);
    fs::write(temp.path().join(".bad_0.metadata"), content).unwrap();

    let (run, result) = classify(temp.path(), ClassifierConfig::default());

    assert_eq!(run.records.len(), 1);
    assert_eq!(run.warnings.len(), 1);
    assert_eq!(run.warnings[0].path, temp.path().join(".bad_0.metadata"));
    assert!(run.warnings[0]
        .to_string()
        .starts_with("could not process"));
    assert_eq!(result.writes.len(), 1);
}

#[test]
fn broken_payloads_keep_the_rest_of_the_record() {
    let temp = tempfile::tempdir().unwrap();
    let write = json!([7, { "caught_write": [0x10, 0x20], "caught_read": null }]);
    write_metadata(
        temp.path(),
        ".aa_0.metadata",
        json!({
            "libasp::bindings::AccessObserverMetadata": write.clone(),
            "libasp::exception_handler::ExceptionHandlerMetadata": [3, { "triggered_exception": "DATAB" }]
        }),
    );
    write_metadata(
        temp.path(),
        ".bb_0.metadata",
        json!({
            "libasp::bindings::AccessObserverMetadata": write,
            "libasp::emulator_module::MiscMetadata": [4, { "mailbox_values": { "ptr_lower": 4 } }]
        }),
    );

    let (run, result) = classify(temp.path(), ClassifierConfig::default());

    assert_eq!(run.records.len(), 2);
    assert_eq!(run.warnings.len(), 2);
    assert_eq!(run.warnings[0].path, temp.path().join(".aa_0.metadata"));
    assert!(matches!(
        run.warnings[0].error,
        MetadataError::MissingLinkRegister(_)
    ));
    assert_eq!(run.warnings[1].path, temp.path().join(".bb_0.metadata"));
    assert!(run.warnings[1].to_string().contains("ptr_higher"));

    assert!(result.exceptions.is_empty());
    assert!(result.mailbox_pointers.is_empty());
    assert_eq!(result.writes.len(), 1);
    assert_eq!(result.writes.values().next().unwrap().count(), 2);
}

#[test]
fn malformed_access_payload_is_a_warning_not_a_skip() {
    let temp = tempfile::tempdir().unwrap();
    write_metadata(
        temp.path(),
        ".bad_0.metadata",
        json!({ "libasp::bindings::AccessObserverMetadata": [1, { "caught_write": [1] }] }),
    );

    let (run, result) = classify(temp.path(), ClassifierConfig::default());
    assert_eq!(run.records.len(), 1);
    assert!(run.records[0].is_empty());
    assert_eq!(run.warnings.len(), 1);
    assert_eq!(result.bucket_count(), 0);
}

#[test]
fn unrelated_files_are_ignored() {
    let temp = tempfile::tempdir().unwrap();
    write_access(temp.path(), ".good_0.metadata", 0x10, 0x20);
    fs::write(temp.path().join("good"), [0u8; 12]).unwrap();
    fs::write(temp.path().join(".good_0.lafl_lock"), b"").unwrap();
    fs::create_dir(temp.path().join(".nested.metadata")).unwrap();

    let (run, _) = classify(temp.path(), ClassifierConfig::default());
    assert_eq!(run.records.len(), 1);
    assert!(run.warnings.is_empty());
}

#[test]
fn missing_directory_is_a_hard_error() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("nope");
    let error = load_run(&missing, &ContentKeyConvention::default()).unwrap_err();
    assert!(error.to_string().contains("nope"));
}

#[test]
fn file_names_without_key_are_reported() {
    let temp = tempfile::tempdir().unwrap();
    write_metadata(temp.path(), "._0.metadata", json!({}));

    let (run, _) = classify(temp.path(), ClassifierConfig::default());
    assert!(run.records.is_empty());
    assert!(matches!(run.warnings[0].error, MetadataError::NoContentKey));
}

#[test]
fn binary_mode_keys_accesses_by_command() {
    let temp = tempfile::tempdir().unwrap();
    write_access(temp.path(), ".aa_0.metadata", 0x100, 0x2000);
    write_access(temp.path(), ".bb_0.metadata", 0x100, 0x3000);
    write_access(temp.path(), ".cc_0.metadata", 0x100, 0x4000);
    write_raw(temp.path(), "aa", 0x0005_0001, 0x10, 0);
    write_raw(temp.path(), "bb", 0x0005_0000, 0x20, 0);

    let (_, result) = classify(temp.path(), binary_config());

    assert!(result.binary);
    let secondaries: Vec<_> = result
        .writes
        .keys()
        .map(|key| key.secondary.clone())
        .collect();
    assert_eq!(
        secondaries,
        vec![KeyPart::CommandId(0x05), KeyPart::FaultingAddress(0x4000)]
    );
    assert_eq!(result.writes[0].count(), 2);
    assert_eq!(
        result.crashing_commands,
        BTreeSet::from([0x05])
    );
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].source, "raw-input");
}

#[test]
fn sanity_checks_emit_diagnostics() {
    let temp = tempfile::tempdir().unwrap();
    let exception = |lower: u32| {
        json!({
            "libasp::exception_handler::ExceptionHandlerMetadata": [3, {
                "triggered_exception": "DATAB",
                "registers": { "lr": "0x00001234" }
            }],
            "libasp::emulator_module::MiscMetadata": [4, {
                "mailbox_values": { "mbox": 0x0005_0000, "ptr_lower": lower, "ptr_higher": 0 }
            }]
        })
    };
    write_metadata(temp.path(), ".ok_0.metadata", exception(0x1001));
    write_metadata(temp.path(), ".aligned_0.metadata", exception(0x1000));
    write_metadata(temp.path(), ".othercmd_0.metadata", exception(0x1003));
    write_raw(temp.path(), "ok", 0x0005_0000, 0x1001, 0);
    write_raw(temp.path(), "aligned", 0x0005_0000, 0x1000, 0);
    write_raw(temp.path(), "othercmd", 0x0007_0000, 0x1003, 0);

    let config = binary_config()
        .with_validator(ExceptionCommandCheck::default())
        .with_validator(UnalignedPointerCheck::default());
    let (_, result) = classify(temp.path(), config);

    let sources: BTreeMap<String, &str> = result
        .diagnostics
        .iter()
        .map(|d| {
            (
                d.path.file_name().unwrap().to_string_lossy().into_owned(),
                d.source,
            )
        })
        .collect();
    assert_eq!(
        sources,
        BTreeMap::from([
            (".aligned_0.metadata".to_string(), "unaligned-pointer"),
            (".othercmd_0.metadata".to_string(), "exception-command"),
        ])
    );
    assert_eq!(result.exceptions.len(), 1);
    assert_eq!(result.exceptions[0].count(), 3);
    assert_eq!(
        result.exception_pointer_nibbles,
        BTreeSet::from([0x0, 0x1, 0x3])
    );
    assert_eq!(result.crashing_commands, BTreeSet::from([0x05, 0x07]));

    let mut out = Vec::new();
    write_report(&result, ReportMode::Summary, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Exception: \t DATAB \t LR: 0x00001234\t count: 3\t"));
    assert!(text.contains("Crashing commands: [0x5, 0x7]"));
    assert!(text.contains("length: 3"));
}

#[test]
fn hyphen_delimited_runs_deduplicate_with_matching_convention() {
    let temp = tempfile::tempdir().unwrap();
    write_access(temp.path(), ".abc-0.metadata", 0x1, 0x2);
    write_access(temp.path(), ".abc-1.metadata", 0x1, 0x2);

    let config = ClassifierConfig {
        convention: ContentKeyConvention::default().with_delimiter('-'),
        ..ClassifierConfig::default()
    };
    let (_, result) = classify(temp.path(), config);
    assert_eq!(result.writes[0].count(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn property_bucket_counts_equal_distinct_inputs(
        entries in proptest::collection::vec((0u8..4, 0u8..3), 1..12),
    ) {
        let temp = tempfile::tempdir().unwrap();
        let mut expected: BTreeMap<u64, BTreeSet<u8>> = BTreeMap::new();

        for (index, (hash, variant)) in entries.iter().enumerate() {
            // Same input always faults at the same place.
            let pc = u64::from(*hash % 2);
            let name = format!(".h{hash}_{variant}_{index}.metadata");
            write_access(temp.path(), &name, pc, 0x1000);
            expected.entry(pc).or_default().insert(*hash);
        }

        let (run, result) = classify(temp.path(), ClassifierConfig::default());
        prop_assert_eq!(run.records.len(), entries.len());

        let counts: BTreeMap<u64, usize> = result
            .writes
            .iter()
            .map(|(key, bucket)| match key.primary {
                KeyPart::ProgramCounter(pc) => (pc, bucket.count()),
                _ => unreachable!(),
            })
            .collect();
        let expected: BTreeMap<u64, usize> =
            expected.into_iter().map(|(pc, hashes)| (pc, hashes.len())).collect();
        prop_assert_eq!(counts, expected);
    }
}
