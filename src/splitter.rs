// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Splits oversized frame-data JSON files into two halves
//!
//! A frame record carries `width`, `height`, `iterations` and a `nums`
//! sequence with one element per iteration. Splitting produces
//! `<stem>_0.json` with the first `ceil(n / 2)` elements and `<stem>_1.json`
//! with the rest; each half's `iterations` equals its own length.
//!
//! Both halves are written to hidden temporary files, synced, and renamed
//! into place before the original is removed, so an interrupted run never
//! loses data.
//!
//! The renderer writes `iterations` as a float (`100.000000`) and bare `NaN`
//! for escaped pixels; both are read and written back as they came.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::SplitterConfig;
use crate::history::{History, Operation};
use crate::listing;
use crate::nonfinite;
use crate::{Result, TidyError};

/// One frame-data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub width: u32,
    pub height: u32,
    /// Any JSON number on input; halves carry their own length
    pub iterations: serde_json::Number,
    /// Per-iteration payload, kept verbatim
    pub nums: Vec<serde_json::Value>,
}

impl FrameRecord {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(&nonfinite::shield(text))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        Ok(nonfinite::restore(serde_json::to_string(self)?))
    }
}

/// Values stamped onto every half, plus the lengths considered well formed
#[derive(Debug, Clone)]
pub struct SplitSettings {
    pub width: u32,
    pub height: u32,
    pub accepted_lengths: Vec<usize>,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self::from(&SplitterConfig::default())
    }
}

impl From<&SplitterConfig> for SplitSettings {
    fn from(config: &SplitterConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            accepted_lengths: config.accepted_lengths.clone(),
        }
    }
}

/// Split a record in two, or `None` if its `nums` length is not accepted.
pub fn split_record(record: &FrameRecord, settings: &SplitSettings) -> Option<(FrameRecord, FrameRecord)> {
    let len = record.nums.len();
    if !settings.accepted_lengths.contains(&len) {
        return None;
    }

    let (first, second) = record.nums.split_at(len.div_ceil(2));
    let half = |nums: &[serde_json::Value]| FrameRecord {
        width: settings.width,
        height: settings.height,
        iterations: serde_json::Number::from(nums.len() as u64),
        nums: nums.to_vec(),
    };

    Some((half(first), half(second)))
}

/// Output names for a frame-data file: `x.json` gives `x_0.json`, `x_1.json`
pub fn derivative_names(name: &str) -> (String, String) {
    let stem = match name.find(".json") {
        Some(idx) => &name[..idx],
        None => Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name),
    };
    (format!("{}_0.json", stem), format!("{}_1.json", stem))
}

/// What happened to one file
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SplitOutcome {
    Split {
        source: PathBuf,
        outputs: [PathBuf; 2],
        lengths: [usize; 2],
    },
    /// `nums` length not accepted; the file is left untouched
    Anomalous {
        index: usize,
        source: PathBuf,
        length: usize,
    },
}

/// Result of a splitter pass
#[derive(Debug, Clone, Serialize, Default)]
pub struct SplitReport {
    pub dry_run: bool,
    pub files: Vec<SplitOutcome>,
}

impl SplitReport {
    pub fn split_count(&self) -> usize {
        self.files.iter().filter(|f| matches!(f, SplitOutcome::Split { .. })).count()
    }

    pub fn anomaly_count(&self) -> usize {
        self.files.len() - self.split_count()
    }
}

/// Split every file in `dir` matching `pattern`.
///
/// `index` in anomaly diagnostics is the file's position in the sorted
/// listing. The history log and config are never read as records. Malformed
/// JSON aborts the pass.
pub fn split_directory(
    dir: &Path,
    pattern: &Pattern,
    settings: &SplitSettings,
    history: &History,
    dry_run: bool,
) -> Result<SplitReport> {
    let mut names = listing::list_matching(dir, pattern)?;
    history.take_protected(dir, &mut names);
    let mut report = SplitReport { dry_run, files: Vec::with_capacity(names.len()) };

    for (index, name) in names.iter().enumerate() {
        let outcome = split_file(dir, name, index, settings, history, dry_run)?;
        report.files.push(outcome);
    }

    info!(
        "{} {} file(s) in {:?}, {} anomalous",
        if dry_run { "Would split" } else { "Split" },
        report.split_count(),
        dir,
        report.anomaly_count()
    );

    Ok(report)
}

/// Split a single file `dir/name`
pub fn split_file(
    dir: &Path,
    name: &str,
    index: usize,
    settings: &SplitSettings,
    history: &History,
    dry_run: bool,
) -> Result<SplitOutcome> {
    let source = dir.join(name);
    info!("Splitting: {:?}", source);

    let text = fs::read_to_string(&source)?;
    let record = FrameRecord::from_json(&text)
        .map_err(|e| TidyError::InvalidRecord { path: source.clone(), source: e })?;

    let Some((first, second)) = split_record(&record, settings) else {
        warn!(
            "-----{}----- {:?} has {} nums, expected one of {:?}; left untouched",
            index,
            source,
            record.nums.len(),
            settings.accepted_lengths
        );
        return Ok(SplitOutcome::Anomalous { index, source, length: record.nums.len() });
    };

    let (name_0, name_1) = derivative_names(name);
    let outputs = [dir.join(&name_0), dir.join(&name_1)];
    let lengths = [first.nums.len(), second.nums.len()];

    if dry_run {
        info!("DRY RUN: Would split {:?} into {:?} ({} + {})", source, outputs, lengths[0], lengths[1]);
        return Ok(SplitOutcome::Split { source, outputs, lengths });
    }

    let temps = [dir.join(format!(".{}.tmp", name_0)), dir.join(format!(".{}.tmp", name_1))];
    if let Err(e) = write_halves(&temps, &outputs, [&first, &second]) {
        for temp in &temps {
            let _ = fs::remove_file(temp);
        }
        return Err(e);
    }
    sync_dir(dir)?;

    fs::remove_file(&source)?;
    history.record(Operation::Split, &source, &outputs)?;
    debug!("Split {:?} into {:?}", source, outputs);

    Ok(SplitOutcome::Split { source, outputs, lengths })
}

fn write_halves(temps: &[PathBuf; 2], outputs: &[PathBuf; 2], halves: [&FrameRecord; 2]) -> Result<()> {
    for (temp, half) in temps.iter().zip(halves) {
        write_synced(temp, half)?;
    }
    // Stale halves from an interrupted earlier run are replaced
    for (temp, output) in temps.iter().zip(outputs) {
        fs::rename(temp, output)?;
    }
    Ok(())
}

fn write_synced(path: &Path, record: &FrameRecord) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(record.to_json()?.as_bytes())?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
