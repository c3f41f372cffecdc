//! CLI entry point for the ASP solution triage binary.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use indexmap as _;
use mailbox_core::{parse_int_literal, ByteOrder, MailboxWord, RawInputLayout, ShiftView};
use serde as _;
use serde_json as _;
use thiserror as _;
use tracing_subscriber::EnvFilter;
use triage::{
    load_run, write_report, ClassifierConfig, Classifier, ContentKeyConvention, CrossReference,
    ExceptionCommandCheck, ReportMode, UnalignedPointerCheck,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;

#[derive(Debug, Parser)]
#[command(name = "asp-triage", version)]
#[command(about = "Triage PSP fuzzing solutions and inspect mailbox values")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Group the solutions of a run into deduplicated buckets.
    Classify(ClassifyArgs),
    /// Decode a PSP mailbox register value.
    Mbox {
        /// Hexadecimal register value, with or without `0x`.
        #[arg(value_parser = parse_hex_word)]
        value: u32,
    },
    /// Show which bits a `(value << left) >> right` pair extracts.
    Shifts {
        /// Value to inspect (`0x`, `0o`, `0b` prefixes and negatives accepted).
        #[arg(allow_negative_numbers = true, value_parser = parse_literal)]
        value: u32,
        /// Left shift amount.
        #[arg(value_parser = parse_literal)]
        left: u32,
        /// Right shift amount.
        #[arg(value_parser = parse_literal)]
        right: u32,
        /// Disable ANSI colors.
        #[arg(long)]
        no_color: bool,
    },
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    /// Run directory; its `solutions` subdirectory is used when present.
    run: PathBuf,

    /// Print the artifact names of all access violations instead of a summary.
    #[arg(short = 'l', long, conflicts_with = "binary")]
    file_list: bool,

    /// Key access buckets by the command id read from each raw input.
    #[arg(short, long)]
    binary: bool,

    /// Separator between content hash and variant in metadata file names.
    #[arg(long, default_value_t = '_')]
    delimiter: char,

    /// Byte offset of the mailbox command word inside a raw input.
    #[arg(long, default_value_t = 0)]
    command_offset: usize,

    /// Byte order of raw input words.
    #[arg(long, value_enum, default_value_t = ByteOrderArg::Little)]
    byte_order: ByteOrderArg,

    /// Report records that break the campaign's expectations.
    #[arg(long)]
    sanity_checks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ByteOrderArg {
    Little,
    Big,
}

impl From<ByteOrderArg> for ByteOrder {
    fn from(value: ByteOrderArg) -> Self {
        match value {
            ByteOrderArg::Little => Self::Little,
            ByteOrderArg::Big => Self::Big,
        }
    }
}

fn parse_hex_word(text: &str) -> Result<u32, String> {
    let digits = text
        .trim()
        .strip_prefix("0x")
        .or_else(|| text.trim().strip_prefix("0X"))
        .unwrap_or_else(|| text.trim());
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hexadecimal value `{text}`: {e}"))
}

fn parse_literal(text: &str) -> Result<u32, String> {
    parse_int_literal(text).ok_or_else(|| format!("invalid 32-bit integer `{text}`"))
}

fn solutions_dir(run: &Path) -> PathBuf {
    let nested = run.join("solutions");
    if nested.is_dir() {
        nested
    } else {
        run.to_path_buf()
    }
}

fn classifier_config(args: &ClassifyArgs) -> ClassifierConfig {
    let cross_reference = if args.binary {
        CrossReference::Binary(RawInputLayout::new(
            args.command_offset,
            args.byte_order.into(),
        ))
    } else {
        CrossReference::Location
    };

    let mut config = ClassifierConfig {
        convention: ContentKeyConvention::default().with_delimiter(args.delimiter),
        cross_reference,
        validators: Vec::new(),
    };

    if args.sanity_checks {
        config = config.with_validator(UnalignedPointerCheck::default());
        if args.binary {
            config = config.with_validator(ExceptionCommandCheck::default());
        } else {
            tracing::info!("command check skipped without --binary");
        }
    }

    config
}

fn run_classify(args: &ClassifyArgs) -> Result<(), i32> {
    let classifier = Classifier::new(classifier_config(args)).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    let dir = solutions_dir(&args.run);
    tracing::info!(dir = %dir.display(), "looking for metadata files");

    let run = load_run(&dir, &classifier.config().convention).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    for warning in &run.warnings {
        tracing::warn!("{warning}");
    }

    let classification = classifier.classify(&run);
    for diagnostic in &classification.diagnostics {
        tracing::warn!("{diagnostic}");
    }

    let mode = if args.file_list {
        ReportMode::FileList
    } else {
        ReportMode::Summary
    };

    let mut out = io::stdout().lock();
    write_report(&classification, mode, &mut out)
        .and_then(|()| out.flush())
        .map_err(|e| {
            eprintln!("error: failed to write report: {e}");
            1
        })
}

fn run_mbox(value: u32) {
    println!("{}", MailboxWord::decode(value));
}

fn run_shifts(value: u32, left: u32, right: u32, no_color: bool) -> Result<(), i32> {
    let view = ShiftView::new(value, left, right).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let colored = !no_color && io::stdout().is_terminal();
    println!("{}", view.render(colored));
    Ok(())
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

    let result = match cli.command {
        Command::Classify(args) => run_classify(&args),
        Command::Mbox { value } => {
            run_mbox(value);
            Ok(())
        }
        Command::Shifts {
            value,
            left,
            right,
            no_color,
        } => run_shifts(value, left, right, no_color),
    };

    std::process::exit(result.err().unwrap_or(0));
}
