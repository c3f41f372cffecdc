//! Text reports for a [`Classification`].

use std::io::{self, Write};

use indexmap::IndexSet;

use crate::aggregate::{Bucket, Classification, Grouping};

/// Report flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// One line per bucket plus binary-mode extras.
    #[default]
    Summary,
    /// Bare artifact file names of all access-violation inputs, e.g. as an
    /// `rsync --files-from` list.
    FileList,
}

/// Writes a report for `classification`.
///
/// # Errors
///
/// Propagates write failures.
pub fn write_report(
    classification: &Classification,
    mode: ReportMode,
    out: &mut impl Write,
) -> io::Result<()> {
    match mode {
        ReportMode::Summary => write_summary(classification, out),
        ReportMode::FileList => write_file_list(classification, out),
    }
}

fn exemplar(bucket: &Bucket) -> String {
    bucket
        .exemplar()
        .map_or_else(String::new, |path| path.display().to_string())
}

fn write_access(label: &str, grouping: &Grouping, out: &mut impl Write) -> io::Result<()> {
    for (key, bucket) in grouping {
        writeln!(
            out,
            "{label} \t {}: {}\t {}: \t {}\t count: {}\t Exemplar: {}",
            key.primary.label(),
            key.primary,
            key.secondary.label(),
            key.secondary,
            bucket.count(),
            exemplar(bucket),
        )?;
    }
    Ok(())
}

fn write_summary(classification: &Classification, out: &mut impl Write) -> io::Result<()> {
    write_access("Write", &classification.writes, out)?;
    write_access("Read", &classification.reads, out)?;

    for (key, bucket) in &classification.exceptions {
        writeln!(
            out,
            "Exception: \t {} \t LR: {}\t count: {}\t Exemplar: {}",
            key.primary,
            key.secondary,
            bucket.count(),
            exemplar(bucket),
        )?;
    }

    if classification.binary {
        let commands: Vec<String> = classification
            .crashing_commands
            .iter()
            .map(|id| format!("{id:#x}"))
            .collect();
        writeln!(out, "Crashing commands: [{}]", commands.join(", "))?;

        let nibbles: Vec<String> = classification
            .exception_pointer_nibbles
            .iter()
            .map(|nibble| format!("{nibble:#b}"))
            .collect();
        writeln!(
            out,
            "Last bytes for all pointers in exceptions: [{}]",
            nibbles.join(", ")
        )?;
    }

    if !classification.mailbox_pointers.is_empty() {
        writeln!(out, "length: {}", classification.mailbox_pointers.len())?;
        for pointer in &classification.mailbox_pointers {
            writeln!(out, "Mailbox ptr: \t {pointer}")?;
        }
    }

    Ok(())
}

fn write_file_list(classification: &Classification, out: &mut impl Write) -> io::Result<()> {
    let names: IndexSet<String> = classification
        .writes
        .values()
        .chain(classification.reads.values())
        .flat_map(Bucket::members)
        .filter_map(|(_, path)| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    for name in names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}
