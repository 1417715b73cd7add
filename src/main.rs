// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! mandeltidy: housekeeping for Mandelbrot render output
//!
//! Moves rendered frames between folders, relabels them for video encoders,
//! and splits oversized frame-data JSON files.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use mandeltidy::config::AppConfig;
use mandeltidy::history::{undo_recent, History, UndoOutcome};
use mandeltidy::listing;
use mandeltidy::mover::{self, MoveReport, WatchSettings};
use mandeltidy::renamer::{self, RenameReport};
use mandeltidy::splitter::{self, SplitOutcome, SplitReport, SplitSettings};

/// mandeltidy CLI - housekeeping for Mandelbrot render output
#[derive(Parser, Debug)]
#[command(name = "mandeltidy")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Move, relabel and split Mandelbrot render output", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "mandeltidy.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move matching frames from the source folder to the destination folder
    Move {
        /// Source directory (overrides config)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Destination directory (overrides config)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// File name pattern, e.g. "*.png" (overrides config)
        #[arg(short, long)]
        pattern: Option<String>,

        /// Dry run mode (don't actually move files)
        #[arg(long)]
        dry_run: bool,

        /// Keep running and move whenever the source folder fills up
        #[arg(short, long, conflicts_with = "dry_run")]
        watch: bool,

        /// Matching files that trigger a move in watch mode (overrides config)
        #[arg(long)]
        threshold: Option<usize>,
    },

    /// Append a suffix to every file name in a directory
    Rename {
        /// Directory to process (overrides config)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Suffix to append (overrides config)
        #[arg(short, long)]
        suffix: Option<String>,

        /// Names to leave alone (replaces config list)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Dry run mode (don't actually rename files)
        #[arg(long)]
        dry_run: bool,
    },

    /// Renumber frames into a zero-padded sequence
    Renumber {
        /// Directory to process (overrides config)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// File name pattern (overrides config)
        #[arg(short, long)]
        pattern: Option<String>,

        /// Digits in the new names (overrides config)
        #[arg(short, long)]
        width: Option<usize>,

        /// Dry run mode (don't actually rename files)
        #[arg(long)]
        dry_run: bool,
    },

    /// Split frame-data JSON files into two halves
    Split {
        /// Directory to process (overrides config)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// File name pattern (overrides config)
        #[arg(short, long)]
        pattern: Option<String>,

        /// Dry run mode (parse and plan only)
        #[arg(long)]
        dry_run: bool,
    },

    /// History and undo operations
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent history entries
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Undo recent moves and renames
    Undo {
        /// Number of operations to undo
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Dry run (show what would be undone)
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear all history
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "mandeltidy.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    let json = cli.format == "json";
    let history = open_history(&config, &cli.config);

    match cli.command {
        Commands::Move { source, dest, pattern, dry_run, watch, threshold } => {
            run_move(&config, &history, source, dest, pattern, dry_run, watch, threshold, json)
        }
        Commands::Rename { dir, suffix, exclude, dry_run } => {
            run_rename(&config, &history, dir, suffix, exclude, dry_run, json)
        }
        Commands::Renumber { dir, pattern, width, dry_run } => {
            run_renumber(&config, &history, dir, pattern, width, dry_run, json)
        }
        Commands::Split { dir, pattern, dry_run } => {
            run_split(&config, &history, dir, pattern, dry_run, json)
        }
        Commands::History { action } => run_history_command(&config, &history, action, json),
        Commands::Config { action } => run_config_command(config, action, &cli.config),
    }
}

/// History log for this run; it and the config file are never touched by a pass
fn open_history(config: &AppConfig, config_path: &Path) -> History {
    let history = if config.history.enabled {
        History::new(PathBuf::from(&config.history.path))
    } else {
        History::disabled()
    };
    history.protecting(config_path)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run the frame mover, once or in watch mode
#[allow(clippy::too_many_arguments)]
fn run_move(
    config: &AppConfig,
    history: &History,
    source: Option<PathBuf>,
    dest: Option<PathBuf>,
    pattern: Option<String>,
    dry_run: bool,
    watch: bool,
    threshold: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let source = source.unwrap_or_else(|| PathBuf::from(&config.mover.source));
    let dest = dest.unwrap_or_else(|| PathBuf::from(&config.mover.destination));
    let pattern = listing::compile(pattern.as_deref().unwrap_or(&config.mover.pattern))?;

    if watch {
        let settings = WatchSettings {
            threshold: threshold.unwrap_or(config.mover.watch_threshold).max(1),
            settle: Duration::from_secs(config.mover.settle_secs),
        };
        info!("Mover active. Press Ctrl+C to stop.");
        mover::watch_and_move(&source, &dest, &pattern, history, &settings, |report| {
            if let Err(e) = print_move_report(report, json) {
                warn!("Failed to print report: {}", e);
            }
        })?;
        return Ok(());
    }

    if dry_run {
        warn!("DRY RUN MODE - files will not be moved");
    }

    let report = mover::move_files(&source, &dest, &pattern, history, dry_run)
        .with_context(|| format!("Moving frames from {:?} to {:?}", source, dest))?;
    print_move_report(&report, json)
}

fn print_move_report(report: &MoveReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }

    let verb = if report.dry_run { "Would move" } else { "Moved" };
    for moved in &report.moved {
        println!("{}: {} -> {}", verb, moved.from.display(), moved.to.display());
    }
    println!("\n{} {} file(s)", verb, report.moved.len());
    Ok(())
}

/// Run the suffix renamer
fn run_rename(
    config: &AppConfig,
    history: &History,
    dir: Option<PathBuf>,
    suffix: Option<String>,
    exclude: Vec<String>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| PathBuf::from(&config.renamer.directory));
    let suffix = suffix.unwrap_or_else(|| config.renamer.suffix.clone());
    let exclude = if exclude.is_empty() { config.renamer.exclude.clone() } else { exclude };
    let excludes = listing::compile_all(&exclude)?;

    if suffix.is_empty() {
        anyhow::bail!("Suffix must not be empty");
    }
    if dry_run {
        warn!("DRY RUN MODE - files will not be renamed");
    }

    let report = renamer::append_suffix(&dir, &excludes, &suffix, history, dry_run)
        .with_context(|| format!("Renaming files in {:?}", dir))?;
    print_rename_report(&report, json)
}

/// Run the frame renumberer
fn run_renumber(
    config: &AppConfig,
    history: &History,
    dir: Option<PathBuf>,
    pattern: Option<String>,
    width: Option<usize>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| PathBuf::from(&config.renamer.directory));
    let pattern = listing::compile(pattern.as_deref().unwrap_or(&config.renamer.pattern))?;
    let width = width.unwrap_or(config.renamer.pad_width).max(1);

    if dry_run {
        warn!("DRY RUN MODE - files will not be renamed");
    }

    let report = renamer::renumber(&dir, &pattern, width, history, dry_run)
        .with_context(|| format!("Renumbering frames in {:?}", dir))?;
    print_rename_report(&report, json)
}

fn print_rename_report(report: &RenameReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }

    let verb = if report.dry_run { "Would rename" } else { "Renamed" };
    for renamed in &report.renamed {
        println!("{}: {} -> {}", verb, renamed.from.display(), renamed.to.display());
    }
    for name in &report.skipped {
        println!("Skipped: {}", name);
    }
    println!("\n{} {} file(s)", verb, report.renamed.len());
    Ok(())
}

/// Run the frame-data splitter
fn run_split(
    config: &AppConfig,
    history: &History,
    dir: Option<PathBuf>,
    pattern: Option<String>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| PathBuf::from(&config.splitter.directory));
    let pattern = listing::compile(pattern.as_deref().unwrap_or(&config.splitter.pattern))?;
    let settings = SplitSettings::from(&config.splitter);

    if dry_run {
        warn!("DRY RUN MODE - nothing will be written or deleted");
    }

    let report = splitter::split_directory(&dir, &pattern, &settings, history, dry_run)
        .with_context(|| format!("Splitting frame data in {:?}", dir))?;
    print_split_report(&report, json)
}

fn print_split_report(report: &SplitReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }

    for file in &report.files {
        match file {
            SplitOutcome::Split { source, outputs, lengths } => {
                println!(
                    "{}: {} -> {} ({}) + {} ({})",
                    if report.dry_run { "Would split" } else { "Split" },
                    source.display(),
                    outputs[0].display(),
                    lengths[0],
                    outputs[1].display(),
                    lengths[1]
                );
            }
            SplitOutcome::Anomalous { index, source, length } => {
                println!("-----{}----- {} ({} nums, left untouched)", index, source.display(), length);
            }
        }
    }
    println!(
        "\n{} file(s) split, {} anomalous",
        report.split_count(),
        report.anomaly_count()
    );
    Ok(())
}

/// Run history commands
fn run_history_command(
    config: &AppConfig,
    history: &History,
    action: HistoryCommands,
    json: bool,
) -> anyhow::Result<()> {
    if !config.history.enabled {
        warn!("History is disabled in the configuration");
    }

    match action {
        HistoryCommands::List { count } => {
            let entries = history.get_recent(count)?;
            if json {
                return print_json(&entries);
            }
            println!("Recent history ({} entries):", entries.len());
            for entry in entries {
                let status = if entry.undone { "[UNDONE]" } else { "" };
                let results: Vec<String> = entry.results.iter().map(|p| p.display().to_string()).collect();
                println!("  {} {:<8} {} -> {} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.operation,
                    entry.source.display(),
                    results.join(", "),
                    status
                );
            }
        }
        HistoryCommands::Undo { count, dry_run } => {
            let outcomes = undo_recent(history, count, dry_run)?;
            if json {
                return print_json(&outcomes);
            }

            if outcomes.is_empty() {
                println!("Nothing to undo");
                return Ok(());
            }

            for outcome in &outcomes {
                match outcome {
                    UndoOutcome::Restored { from, to } => {
                        println!("Undone: {} -> {}", from.display(), to.display());
                    }
                    UndoOutcome::WouldRestore { from, to } => {
                        println!("Would undo: {} -> {}", from.display(), to.display());
                    }
                    UndoOutcome::Irreversible { operation, source } => {
                        println!("Skip: {} of {} cannot be undone", operation, source.display());
                    }
                    UndoOutcome::Missing { path } => {
                        println!("Skip: {} (file not found, may have been moved/deleted)", path.display());
                    }
                    UndoOutcome::Occupied { path } => {
                        println!("Skip: {} (original path already exists)", path.display());
                    }
                }
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            history.clear()?;
            println!("History cleared: {}", history.path().display());
        }
    }

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Show => {
            print_json(&config)?;
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            // Loading already validated it
            println!("Configuration at {:?} is valid", config_path);
            println!("  Mover: {} -> {} ({})", config.mover.source, config.mover.destination, config.mover.pattern);
            println!("  Renamer: {} (suffix {:?})", config.renamer.directory, config.renamer.suffix);
            println!("  Splitter: {} (lengths {:?})", config.splitter.directory, config.splitter.accepted_lengths);
            println!("  History: {}", if config.history.enabled { config.history.path.as_str() } else { "disabled" });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["mandeltidy"]).is_err());
    }

    #[test]
    fn test_cli_move_command() {
        let cli = Cli::try_parse_from([
            "mandeltidy", "move", "--dry-run", "--source", "/tmp/imgs", "--dest", "/tmp/imgs2"
        ]).unwrap();

        match cli.command {
            Commands::Move { dry_run, source, dest, watch, .. } => {
                assert!(dry_run);
                assert!(!watch);
                assert_eq!(source, Some(PathBuf::from("/tmp/imgs")));
                assert_eq!(dest, Some(PathBuf::from("/tmp/imgs2")));
            }
            _ => panic!("Expected Move command"),
        }
    }

    #[test]
    fn test_cli_watch_conflicts_with_dry_run() {
        assert!(Cli::try_parse_from(["mandeltidy", "move", "--watch", "--dry-run"]).is_err());
    }

    #[test]
    fn test_cli_rename_excludes() {
        let cli = Cli::try_parse_from([
            "mandeltidy", "rename", "-e", "*.DS_Store", "-e", "Thumbs.db", "--suffix", ".png"
        ]).unwrap();

        match cli.command {
            Commands::Rename { exclude, suffix, .. } => {
                assert_eq!(exclude, vec!["*.DS_Store", "Thumbs.db"]);
                assert_eq!(suffix.as_deref(), Some(".png"));
            }
            _ => panic!("Expected Rename command"),
        }
    }

    #[test]
    fn test_cli_split_with_global_flags() {
        let cli = Cli::try_parse_from([
            "mandeltidy", "split", "--dir", "/tmp/files", "--format", "json", "-q"
        ]).unwrap();

        assert_eq!(cli.format, "json");
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Split { .. }));
    }

    #[test]
    fn test_cli_history_undo() {
        let cli = Cli::try_parse_from(["mandeltidy", "history", "undo", "-n", "3"]).unwrap();

        match cli.command {
            Commands::History { action: HistoryCommands::Undo { count, dry_run } } => {
                assert_eq!(count, 3);
                assert!(!dry_run);
            }
            _ => panic!("Expected History Undo command"),
        }
    }

    #[test]
    fn test_open_history_protects_log_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.history.enabled = true;
        config.history.path = dir.path().join("mandeltidy_history.jsonl").display().to_string();
        let config_path = dir.path().join("mandeltidy.json");

        let history = open_history(&config, &config_path);
        assert!(history.is_protected(&config_path));
        assert!(history.is_protected(&dir.path().join("mandeltidy_history.jsonl")));

        config.history.enabled = false;
        let history = open_history(&config, &config_path);
        assert!(history.is_protected(&config_path));
    }
}
