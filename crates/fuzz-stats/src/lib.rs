//! Fuzzing campaign statistics: log timelines, snapshot files, scaling
//! summaries and plots.

use clap as _;
use tracing_subscriber as _;

/// Error type.
pub mod errors;
pub use errors::StatsError;

/// Snapshots and the JSON snapshot file.
pub mod snapshot;
pub use snapshot::{output_path, Snapshot, SnapshotEntry, SnapshotFile};

/// Log line extraction.
pub mod timeline;
pub use timeline::{extract_file, Timeline, TimelineConfig, TimelineExtractor};

/// Cross-run scaling summary.
pub mod scaling;
pub use scaling::{client_index, ScalingPoint, ScalingSeries};

/// PNG rendering.
pub mod plot;
pub use plot::{render_scaling, render_timeline, PLOT_SIZE};

#[cfg(test)]
use proptest as _;
