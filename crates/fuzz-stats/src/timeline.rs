//! Fuzzer log to time series.
//!
//! The fuzzer monitor prints a statistics line whenever something changes.
//! Lines arrive at irregular times, so values are snapped to a regular grid
//! of timesteps: the first global line at or past the next timestep produces
//! one [`Snapshot`] labelled with that timestep. The grid is fine for the
//! first hour and coarse afterwards.

use std::io::BufRead;
use std::path::Path;

use regex::{Captures, Regex};

use crate::errors::StatsError;
use crate::snapshot::Snapshot;

/// Timestep grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineConfig {
    /// First timestep, in seconds.
    pub first_timestep: u64,
    /// Step below `coarse_after`.
    pub fine_step: u64,
    /// Step from `coarse_after` on.
    pub coarse_step: u64,
    /// Timestep at which the coarse step takes over.
    pub coarse_after: u64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            first_timestep: 10,
            fine_step: 10,
            coarse_step: 600,
            coarse_after: 3600,
        }
    }
}

impl TimelineConfig {
    /// Rejects grids that would never advance.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidConfig`] when a step is zero.
    pub const fn validate(&self) -> Result<(), StatsError> {
        if self.fine_step == 0 {
            return Err(StatsError::InvalidConfig("fine step must be positive"));
        }
        if self.coarse_step == 0 {
            return Err(StatsError::InvalidConfig("coarse step must be positive"));
        }
        Ok(())
    }

    const fn step_after(&self, timestep: u64) -> u64 {
        if timestep < self.coarse_after {
            self.fine_step
        } else {
            self.coarse_step
        }
    }
}

#[derive(Debug)]
struct LinePatterns {
    runtime: Regex,
    clients: Regex,
    corpus: Regex,
    objectives: Regex,
    executions: Regex,
    execs_per_sec: Regex,
    edges: Regex,
}

impl LinePatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            runtime: Regex::new(r"run time: (\d+)h-(\d+)m-(\d+)s")?,
            clients: Regex::new(r"clients: (\d+)")?,
            corpus: Regex::new(r"corpus: (\d+)")?,
            objectives: Regex::new(r"objectives: (\d+)")?,
            executions: Regex::new(r"executions: (\d+)")?,
            execs_per_sec: Regex::new(r"exec/sec: (\d+(?:\.\d+)?)(k?)")?,
            edges: Regex::new(r"edges: (\d+)")?,
        })
    }

    fn number(pattern: &Regex, line: &str) -> Option<u64> {
        pattern.captures(line)?.get(1)?.as_str().parse().ok()
    }

    fn elapsed(&self, line: &str) -> Option<u64> {
        let captures = self.runtime.captures(line)?;
        let field = |caps: &Captures<'_>, index| -> Option<u64> {
            caps.get(index)?.as_str().parse().ok()
        };
        let hours = field(&captures, 1)?;
        let minutes = field(&captures, 2)?;
        let seconds = field(&captures, 3)?;

        hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)
    }

    fn execs_per_sec(&self, line: &str) -> Option<f64> {
        let captures = self.execs_per_sec.captures(line)?;
        let value: f64 = captures.get(1)?.as_str().parse().ok()?;
        let kilo = captures.get(2).is_some_and(|m| m.as_str() == "k");
        Some(if kilo { value * 1000.0 } else { value })
    }
}

fn is_global_line(line: &str) -> bool {
    line.starts_with("[Stats #0]") || line.contains("(GLOBAL)")
}

/// Everything extracted from one log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    /// Snapshots in timestep order.
    pub snapshots: Vec<Snapshot>,
    /// Global lines that crossed a timestep but lacked a field.
    pub skipped_lines: usize,
    /// Last elapsed time seen on a global line.
    pub last_elapsed: Option<u64>,
}

/// Single-pass snapshot extractor.
#[derive(Debug)]
pub struct TimelineExtractor {
    config: TimelineConfig,
    patterns: LinePatterns,
    next_timestep: u64,
    max_edges: u64,
    timeline: Timeline,
}

impl TimelineExtractor {
    /// Creates an extractor for the given grid.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidConfig`] for an unusable grid.
    pub fn new(config: TimelineConfig) -> Result<Self, StatsError> {
        config.validate()?;
        Ok(Self {
            config,
            patterns: LinePatterns::new()?,
            next_timestep: config.first_timestep,
            max_edges: 0,
            timeline: Timeline::default(),
        })
    }

    /// Feeds one log line; returns the snapshot it produced, if any.
    pub fn handle_line(&mut self, line: &str) -> Option<&Snapshot> {
        if let Some(edges) = LinePatterns::number(&self.patterns.edges, line) {
            self.max_edges = self.max_edges.max(edges);
        }

        if !is_global_line(line) {
            return None;
        }

        let elapsed = self.patterns.elapsed(line)?;
        self.timeline.last_elapsed = Some(elapsed);

        if elapsed < self.next_timestep {
            return None;
        }

        let fields = (
            LinePatterns::number(&self.patterns.corpus, line),
            LinePatterns::number(&self.patterns.objectives, line),
            LinePatterns::number(&self.patterns.executions, line),
            self.patterns.execs_per_sec(line),
        );
        let (Some(corpus), Some(objectives), Some(executions), Some(execs_per_sec)) = fields else {
            self.timeline.skipped_lines += 1;
            tracing::debug!(elapsed, "statistics line without all fields");
            return None;
        };

        let timestep = self.next_timestep;
        self.next_timestep = timestep.saturating_add(self.config.step_after(timestep));
        self.timeline.snapshots.push(Snapshot {
            timestep,
            elapsed,
            corpus,
            objectives,
            executions,
            execs_per_sec,
            edges: self.max_edges,
            clients: LinePatterns::number(&self.patterns.clients, line),
        });
        self.timeline.snapshots.last()
    }

    /// Timestep the next snapshot will be labelled with.
    #[must_use]
    pub const fn next_timestep(&self) -> u64 {
        self.next_timestep
    }

    /// Highest edge count seen so far.
    #[must_use]
    pub const fn max_edges(&self) -> u64 {
        self.max_edges
    }

    /// Last elapsed time seen on a global line.
    #[must_use]
    pub const fn last_elapsed(&self) -> Option<u64> {
        self.timeline.last_elapsed
    }

    /// Snapshots produced so far.
    #[must_use]
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.timeline.snapshots
    }

    /// Global lines skipped for missing fields.
    #[must_use]
    pub const fn skipped_lines(&self) -> usize {
        self.timeline.skipped_lines
    }

    /// Consumes the extractor.
    #[must_use]
    pub fn finish(self) -> Timeline {
        self.timeline
    }

    /// Feeds every line of `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Io`] when reading fails; `source` names the input
    /// in that error.
    pub fn feed(&mut self, reader: impl BufRead, source: &Path) -> Result<(), StatsError> {
        for line in reader.lines() {
            let line = line.map_err(|error| StatsError::Io {
                path: source.to_path_buf(),
                source: error,
            })?;
            self.handle_line(&line);
        }
        Ok(())
    }
}

/// Extracts the timeline of a log file.
///
/// # Errors
///
/// Returns [`StatsError::Io`] when the file cannot be read.
pub fn extract_file(path: &Path, config: TimelineConfig) -> Result<Timeline, StatsError> {
    let file = std::fs::File::open(path).map_err(StatsError::io(path))?;
    let mut extractor = TimelineExtractor::new(config)?;
    extractor.feed(std::io::BufReader::new(file), path)?;
    Ok(extractor.finish())
}
