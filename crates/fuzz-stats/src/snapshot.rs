//! Snapshots and their JSON file form.
//!
//! The file maps each timestep (seconds, as a string key) to the values
//! observed when that timestep was crossed:
//!
//! ```text
//! { "10": { "actual_value": 12, "corpus": 4, "objectives": 0,
//!           "executions": 1200, "exec/sec": 100.0, "edges": 37 } }
//! ```

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::StatsError;

/// Campaign statistics sampled at one timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Timestep the sample was snapped to, in seconds.
    pub timestep: u64,
    /// Elapsed time actually reported by the line, in seconds.
    pub elapsed: u64,
    /// Corpus size.
    pub corpus: u64,
    /// Objectives found.
    pub objectives: u64,
    /// Total executions.
    pub executions: u64,
    /// Executions per second.
    pub execs_per_sec: f64,
    /// Highest edge count seen so far.
    pub edges: u64,
    /// Connected clients, when the line reports them.
    pub clients: Option<u64>,
}

/// One timestep entry of a [`SnapshotFile`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Elapsed time actually reported.
    pub actual_value: u64,
    /// Corpus size.
    pub corpus: u64,
    /// Objectives found.
    pub objectives: u64,
    /// Total executions.
    pub executions: u64,
    /// Executions per second.
    #[serde(rename = "exec/sec")]
    pub execs_per_sec: f64,
    /// Highest edge count seen so far.
    pub edges: u64,
}

impl From<&Snapshot> for SnapshotEntry {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            actual_value: snapshot.elapsed,
            corpus: snapshot.corpus,
            objectives: snapshot.objectives,
            executions: snapshot.executions,
            execs_per_sec: snapshot.execs_per_sec,
            edges: snapshot.edges,
        }
    }
}

/// Timestep-ordered snapshot map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotFile {
    entries: BTreeMap<u64, SnapshotEntry>,
}

impl SnapshotFile {
    /// Builds the file form of `snapshots`.
    #[must_use]
    pub fn from_snapshots(snapshots: &[Snapshot]) -> Self {
        Self {
            entries: snapshots
                .iter()
                .map(|snapshot| (snapshot.timestep, SnapshotEntry::from(snapshot)))
                .collect(),
        }
    }

    /// Entries by timestep.
    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<u64, SnapshotEntry> {
        &self.entries
    }

    /// Number of timesteps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no timestep was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry of the latest timestep.
    #[must_use]
    pub fn last(&self) -> Option<(u64, &SnapshotEntry)> {
        self.entries
            .iter()
            .next_back()
            .map(|(timestep, entry)| (*timestep, entry))
    }

    /// Converts back to snapshots; client counts are not stored.
    #[must_use]
    pub fn to_snapshots(&self) -> Vec<Snapshot> {
        self.entries
            .iter()
            .map(|(timestep, entry)| Snapshot {
                timestep: *timestep,
                elapsed: entry.actual_value,
                corpus: entry.corpus,
                objectives: entry.objectives,
                executions: entry.executions,
                execs_per_sec: entry.execs_per_sec,
                edges: entry.edges,
                clients: None,
            })
            .collect()
    }

    /// Reads a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Io`] or [`StatsError::Json`].
    pub fn read(path: &Path) -> Result<Self, StatsError> {
        let bytes = fs::read(path).map_err(StatsError::io(path))?;
        serde_json::from_slice(&bytes).map_err(|source| StatsError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the file as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Io`] or [`StatsError::Json`].
    pub fn write(&self, path: &Path) -> Result<(), StatsError> {
        let file = File::create(path).map_err(StatsError::io(path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| StatsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(StatsError::io(path))
    }
}

/// Resolves an output file next to the log file, forcing `extension`.
#[must_use]
pub fn output_path(log_file: &Path, requested: &Path, extension: &str) -> PathBuf {
    let name = if requested.extension() == Some(OsStr::new(extension)) {
        requested.to_path_buf()
    } else {
        requested.with_extension(extension)
    };

    log_file.parent().map_or_else(|| name.clone(), |dir| dir.join(&name))
}
