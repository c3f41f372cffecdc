//! Cross-run scaling summary.
//!
//! Each run with `N` extra fuzzing clients leaves a `stats<N>.json` snapshot
//! file. The last sample of every file is averaged per `N`; the series is
//! indexed by the total client count `N + 1`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::StatsError;
use crate::snapshot::{SnapshotEntry, SnapshotFile};

/// Averages for one client count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingPoint {
    /// Total clients (`N + 1`).
    pub clients: u64,
    /// Number of runs averaged.
    pub runs: usize,
    /// Mean final edge count.
    pub edges: f64,
    /// Mean final objective count.
    pub objectives: f64,
    /// Mean final execution rate.
    pub execs_per_sec: f64,
}

/// Scaling series ordered by client count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalingSeries {
    /// One point per client count.
    pub points: Vec<ScalingPoint>,
}

/// Extracts `N` from a `stats<N>.json` file name.
#[must_use]
pub fn client_index(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix("stats")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl ScalingSeries {
    /// Builds the series from `(N, last sample)` pairs.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_samples(samples: impl IntoIterator<Item = (u64, SnapshotEntry)>) -> Self {
        let mut grouped: BTreeMap<u64, Vec<SnapshotEntry>> = BTreeMap::new();
        for (index, entry) in samples {
            grouped.entry(index).or_default().push(entry);
        }

        let points = grouped
            .into_iter()
            .map(|(index, entries)| ScalingPoint {
                clients: index.saturating_add(1),
                runs: entries.len(),
                edges: mean(entries.iter().map(|e| e.edges as f64)),
                objectives: mean(entries.iter().map(|e| e.objectives as f64)),
                execs_per_sec: mean(entries.iter().map(|e| e.execs_per_sec)),
            })
            .collect();

        Self { points }
    }

    /// Reads snapshot files and builds the series.
    ///
    /// Files not named `stats<N>.json` and files without samples are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first read or parse failure.
    pub fn from_files(paths: &[PathBuf]) -> Result<Self, StatsError> {
        let mut samples = Vec::new();

        for path in paths {
            let Some(index) = client_index(path) else {
                tracing::debug!(path = %path.display(), "not a stats<N>.json file, skipping");
                continue;
            };

            let file = SnapshotFile::read(path)?;
            let Some((timestep, entry)) = file.last() else {
                tracing::warn!(path = %path.display(), "snapshot file has no samples");
                continue;
            };
            tracing::debug!(path = %path.display(), timestep, "using last sample");
            samples.push((index, *entry));
        }

        Ok(Self::from_samples(samples))
    }

    /// True when there is no point to plot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
