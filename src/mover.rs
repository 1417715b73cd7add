// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Moves rendered frames out of an overcrowded folder

use glob::Pattern;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::history::{History, Operation};
use crate::listing;
use crate::watcher::{wait_for_stable, FileWatcher, WatchEvent};
use crate::{Result, TidyError};

/// A single planned or completed move
#[derive(Debug, Clone, Serialize)]
pub struct MovedFile {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Result of one mover pass
#[derive(Debug, Clone, Serialize, Default)]
pub struct MoveReport {
    pub dry_run: bool,
    pub moved: Vec<MovedFile>,
}

/// Move every entry of `source` matching `pattern` into `destination`.
///
/// Entries are processed in file name order and keep their names. The pass
/// stops at the first failure; files moved before it stay moved.
pub fn move_files(
    source: &Path,
    destination: &Path,
    pattern: &Pattern,
    history: &History,
    dry_run: bool,
) -> Result<MoveReport> {
    let mut names = listing::list_matching(source, pattern)?;
    history.take_protected(source, &mut names);
    let mut report = MoveReport { dry_run, moved: Vec::with_capacity(names.len()) };

    if names.is_empty() {
        debug!("Nothing matching {} in {:?}", pattern, source);
        return Ok(report);
    }

    if !dry_run && !destination.exists() {
        std::fs::create_dir_all(destination)?;
        info!("Created destination directory: {:?}", destination);
    }

    for name in names {
        let from = source.join(&name);
        let to = destination.join(&name);

        if to.exists() {
            return Err(TidyError::DestinationExists(to));
        }

        if dry_run {
            info!("DRY RUN: Would move {:?} to {:?}", from, to);
        } else {
            std::fs::rename(&from, &to)?;
            history.record(Operation::Move, &from, std::slice::from_ref(&to))?;
            debug!("Moved {:?} -> {:?}", from, to);
        }

        report.moved.push(MovedFile { from, to });
    }

    info!(
        "{} {} file(s) from {:?} to {:?}",
        if dry_run { "Would move" } else { "Moved" },
        report.moved.len(),
        source,
        destination
    );

    Ok(report)
}

/// Settings for [`watch_and_move`]
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Matching files in the source folder that trigger a pass
    pub threshold: usize,
    /// Longest wait for the newest frame to finish writing
    pub settle: Duration,
}

/// Watch-mode state: how many frames wait in the source folder and which
/// one arrived last.
///
/// Each watcher event, or `None` for a quiet tick, goes through
/// [`ThresholdMover::handle`]. The count is taken from the folder listing
/// every time, so renames and missed events cannot make it drift.
pub struct ThresholdMover<'a> {
    source: &'a Path,
    destination: &'a Path,
    pattern: &'a Pattern,
    history: &'a History,
    settings: &'a WatchSettings,
    matching: usize,
    pending: Option<PathBuf>,
}

impl<'a> ThresholdMover<'a> {
    /// Start from the frames already in `source`
    pub fn new(
        source: &'a Path,
        destination: &'a Path,
        pattern: &'a Pattern,
        history: &'a History,
        settings: &'a WatchSettings,
    ) -> Result<Self> {
        let mut mover = Self {
            source,
            destination,
            pattern,
            history,
            settings,
            matching: 0,
            pending: None,
        };
        mover.recount()?;
        Ok(mover)
    }

    /// Matching files seen in the source folder at the last count
    pub fn matching(&self) -> usize {
        self.matching
    }

    /// Apply one event and run a pass if the threshold is reached
    pub fn handle(&mut self, event: Option<WatchEvent>) -> Result<Option<MoveReport>> {
        match event {
            Some(WatchEvent::FileArrived(path)) => {
                let matches = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| self.pattern.matches(n));
                if matches {
                    self.pending = Some(path);
                }
                self.recount()?;
            }
            Some(WatchEvent::FileRemoved(_)) | None => self.recount()?,
            Some(WatchEvent::Error(e)) => warn!("Watch error: {}", e),
            Some(WatchEvent::Disconnected) => {
                return Err(TidyError::Watch(notify::Error::generic("watcher disconnected")));
            }
        }

        if self.matching < self.settings.threshold {
            return Ok(None);
        }

        if let Some(newest) = self.pending.take() {
            if !wait_for_stable(&newest, self.settings.settle) {
                debug!("File disappeared during stability check: {:?}", newest);
            }
        }

        let report = move_files(self.source, self.destination, self.pattern, self.history, false)?;
        self.recount()?;
        Ok(Some(report))
    }

    fn recount(&mut self) -> Result<()> {
        let mut names = listing::list_matching(self.source, self.pattern)?;
        self.history.take_protected(self.source, &mut names);
        self.matching = names.len();
        Ok(())
    }
}

/// Keep the source folder below `threshold` matching files.
///
/// Runs until the watcher stops, which is returned as an error. `on_pass`
/// is called after every pass that moved something.
pub fn watch_and_move<F>(
    source: &Path,
    destination: &Path,
    pattern: &Pattern,
    history: &History,
    settings: &WatchSettings,
    mut on_pass: F,
) -> Result<()>
where
    F: FnMut(&MoveReport),
{
    let mut watcher = FileWatcher::new()?;
    watcher.watch(source)?;

    // Count frames rendered while we were not running
    let mut mover = ThresholdMover::new(source, destination, pattern, history, settings)?;

    info!(
        "Watching {:?}: moving to {:?} once {} file(s) match {}",
        source, destination, settings.threshold, pattern
    );

    loop {
        let event = watcher.next_event(Duration::from_millis(500));
        if let Some(report) = mover.handle(event)? {
            if !report.moved.is_empty() {
                on_pass(&report);
            }
        }
    }
}
