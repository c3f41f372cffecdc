//! CLI entry point for the fuzzing statistics binary.

use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use fuzz_stats::{
    extract_file, output_path, render_scaling, render_timeline, ScalingSeries, SnapshotFile,
    TimelineConfig,
};
use plotters as _;
use regex as _;
use serde as _;
use serde_json as _;
use thiserror as _;
use tracing_subscriber::EnvFilter;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;

#[derive(Debug, Parser)]
#[command(name = "asp-stats", version)]
#[command(about = "Turn fuzzer logs into snapshot files and plots")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract a timeline from one fuzzer log.
    Plot {
        /// Fuzzer log file.
        log_file: PathBuf,
        /// Plot file, written next to the log (`.png` is enforced).
        #[arg(short, long)]
        plot_file: Option<PathBuf>,
        /// Snapshot file, written next to the log (`.json` is enforced).
        #[arg(short, long)]
        json_file: Option<PathBuf>,
    },
    /// Plot final values of several runs against their client count.
    Scaling {
        /// `stats<N>.json` snapshot files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Plot file (`.png` is enforced).
        #[arg(short, long)]
        plot_file: PathBuf,
    },
}

fn run_plot(log_file: &Path, plot_file: Option<&Path>, json_file: Option<&Path>) -> Result<(), i32> {
    if !log_file.is_file() {
        eprintln!("error: {} is not a valid file", log_file.display());
        return Err(1);
    }

    let timeline = extract_file(log_file, TimelineConfig::default()).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    if timeline.skipped_lines > 0 {
        tracing::warn!(
            skipped = timeline.skipped_lines,
            "statistics lines without all fields were skipped"
        );
    }
    tracing::info!(snapshots = timeline.snapshots.len(), "timeline extracted");

    if let Some(requested) = json_file {
        let path = output_path(log_file, requested, "json");
        SnapshotFile::from_snapshots(&timeline.snapshots)
            .write(&path)
            .map_err(|e| {
                eprintln!("error: {e}");
                1
            })?;
        tracing::info!(path = %path.display(), "snapshot file written");
    }

    if let Some(requested) = plot_file {
        let path = output_path(log_file, requested, "png");
        render_timeline(&path, &timeline.snapshots).map_err(|e| {
            eprintln!("error: {e}");
            1
        })?;
    }

    match timeline.last_elapsed {
        Some(total) => println!("Analyzer total sec {total}"),
        None => println!("Analyzer total sec unknown"),
    }
    Ok(())
}

fn run_scaling(files: &[PathBuf], plot_file: &Path) -> Result<(), i32> {
    let series = ScalingSeries::from_files(files).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    for point in &series.points {
        tracing::info!(
            clients = point.clients,
            runs = point.runs,
            edges = point.edges,
            objectives = point.objectives,
            execs_per_sec = point.execs_per_sec,
            "scaling point"
        );
    }

    let path = if plot_file.extension().is_some_and(|ext| ext == "png") {
        plot_file.to_path_buf()
    } else {
        plot_file.with_extension("png")
    };
    render_scaling(&path, &series).map_err(|e| {
        eprintln!("error: {e}");
        1
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            std::process::exit(i32::from(error.use_stderr()));
        }
    };

    init_tracing();

    let result = match &cli.command {
        Command::Plot {
            log_file,
            plot_file,
            json_file,
        } => run_plot(log_file, plot_file.as_deref(), json_file.as_deref()),
        Command::Scaling { files, plot_file } => run_scaling(files, plot_file),
    };

    std::process::exit(result.err().unwrap_or(0));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("asp-stats").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_plot_with_outputs() {
        let cli = parse(&["plot", "fuzz.log", "-p", "out", "-j", "out"]).expect("valid args");
        let Command::Plot {
            log_file,
            plot_file,
            json_file,
        } = cli.command
        else {
            panic!("expected plot");
        };
        assert_eq!(log_file, PathBuf::from("fuzz.log"));
        assert_eq!(plot_file, Some(PathBuf::from("out")));
        assert_eq!(json_file, Some(PathBuf::from("out")));
    }

    #[test]
    fn scaling_requires_files_and_plot() {
        assert!(parse(&["scaling", "-p", "out.png"]).is_err());
        assert!(parse(&["scaling", "stats1.json"]).is_err());
        let cli = parse(&["scaling", "stats1.json", "stats3.json", "-p", "out"]).expect("valid");
        assert!(matches!(cli.command, Command::Scaling { ref files, .. } if files.len() == 2));
    }
}
