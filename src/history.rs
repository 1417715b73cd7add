// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! History management for undo support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::Result;

/// Kind of file operation recorded in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Move,
    Rename,
    Renumber,
    Split,
}

impl Operation {
    /// Whether the result can be renamed back onto the source path
    pub fn is_reversible(self) -> bool {
        !matches!(self, Operation::Split)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Move => "move",
            Operation::Rename => "rename",
            Operation::Renumber => "renumber",
            Operation::Split => "split",
        };
        f.pad(name)
    }
}

/// A single file operation in history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub source: PathBuf,
    /// One path for move/rename/renumber, two for split
    pub results: Vec<PathBuf>,
    pub undone: bool,
}

/// History manager for tracking file operations
pub struct History {
    path: PathBuf,
    enabled: bool,
    /// Files that passes must never touch, starting with the log itself
    protected: Vec<PathBuf>,
}

impl History {
    /// Create a new history manager
    pub fn new(path: PathBuf) -> Self {
        let protected = vec![locate(&path)];
        Self { path, enabled: true, protected }
    }

    /// A history that records nothing
    pub fn disabled() -> Self {
        Self { path: PathBuf::new(), enabled: false, protected: Vec::new() }
    }

    /// Also keep `path` out of every listing
    pub fn protecting(mut self, path: &Path) -> Self {
        self.protected.push(locate(path));
        self
    }

    /// Whether `path` is the history log or another protected file
    pub fn is_protected(&self, path: &Path) -> bool {
        if self.protected.is_empty() {
            return false;
        }
        let target = locate(path);
        self.protected.iter().any(|p| *p == target)
    }

    /// Drop protected entries of `dir` from `names`, returning them
    pub fn take_protected(&self, dir: &Path, names: &mut Vec<String>) -> Vec<String> {
        let (protected, rest): (Vec<String>, Vec<String>) = std::mem::take(names)
            .into_iter()
            .partition(|name| self.is_protected(&dir.join(name)));
        *names = rest;
        for name in &protected {
            tracing::debug!("Leaving protected file {:?} alone", dir.join(name));
        }
        protected
    }

    /// Record an operation
    pub fn record(&self, operation: Operation, source: &Path, results: &[PathBuf]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let entry = create_entry(
            uuid::Uuid::new_v4().to_string(),
            operation,
            source.to_path_buf(),
            results.to_vec(),
        );
        self.append(&entry)
    }

    /// Append an entry to the history
    pub fn append(&self, entry: &HistoryEntry) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all history entries
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.enabled || !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Failed to parse history entry: {}", e);
                }
            }
        }

        Ok(entries)
    }

    /// Get the most recent N entries (newest first)
    pub fn get_recent(&self, count: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all()?;
        entries.reverse();
        entries.truncate(count);
        Ok(entries)
    }

    /// Mark an entry as undone
    pub fn mark_undone(&self, id: &str) -> Result<()> {
        let entries = self.read_all()?;

        // Rewrite the entire file with the updated entry
        let file = File::create(&self.path)?;
        let mut writer = std::io::BufWriter::new(file);

        for mut entry in entries {
            if entry.id == id {
                entry.undone = true;
            }
            let json = serde_json::to_string(&entry)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Get entries that haven't been undone (oldest first)
    pub fn get_undoable(&self) -> Result<Vec<HistoryEntry>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().filter(|e| !e.undone).collect())
    }

    /// Clear all history
    pub fn clear(&self) -> Result<()> {
        if self.enabled && self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Get history file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Absolute form of `path` with only the parent resolved, so files that do
/// not exist yet still compare equal to their later listing entries
fn locate(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

/// Create a new history entry
pub fn create_entry(
    id: String,
    operation: Operation,
    source: PathBuf,
    results: Vec<PathBuf>,
) -> HistoryEntry {
    HistoryEntry {
        id,
        timestamp: Utc::now(),
        operation,
        source,
        results,
        undone: false,
    }
}

/// Outcome of undoing one history entry
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UndoOutcome {
    Restored { from: PathBuf, to: PathBuf },
    WouldRestore { from: PathBuf, to: PathBuf },
    Irreversible { operation: Operation, source: PathBuf },
    Missing { path: PathBuf },
    Occupied { path: PathBuf },
}

/// Undo the `count` most recent reversible operations, newest first.
///
/// Split entries are reported and passed over without counting towards
/// `count`. Entries whose paths are missing or occupied still count.
pub fn undo_recent(history: &History, count: usize, dry_run: bool) -> Result<Vec<UndoOutcome>> {
    let mut outcomes = Vec::new();
    let mut attempted = 0;

    for entry in history.get_undoable()?.into_iter().rev() {
        if attempted >= count {
            break;
        }

        if !entry.operation.is_reversible() {
            outcomes.push(UndoOutcome::Irreversible {
                operation: entry.operation,
                source: entry.source.clone(),
            });
            continue;
        }
        attempted += 1;

        let Some(current) = entry.results.first().cloned() else {
            tracing::warn!("History entry {} has no result path", entry.id);
            continue;
        };

        if !current.exists() {
            tracing::warn!("File not found (may have been moved/deleted): {:?}", current);
            outcomes.push(UndoOutcome::Missing { path: current });
            continue;
        }
        if entry.source.exists() {
            tracing::warn!("Original path already exists: {:?}", entry.source);
            outcomes.push(UndoOutcome::Occupied { path: entry.source.clone() });
            continue;
        }

        if dry_run {
            outcomes.push(UndoOutcome::WouldRestore { from: current, to: entry.source.clone() });
        } else {
            fs::rename(&current, &entry.source)?;
            history.mark_undone(&entry.id)?;
            tracing::info!("Undone {}: {:?} -> {:?}", entry.operation, current, entry.source);
            outcomes.push(UndoOutcome::Restored { from: current, to: entry.source.clone() });
        }
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("h.jsonl"));

        history.record(Operation::Move, Path::new("/a/1.png"), &[PathBuf::from("/b/1.png")]).unwrap();
        history
            .record(
                Operation::Split,
                Path::new("/f/x.json"),
                &[PathBuf::from("/f/x_0.json"), PathBuf::from("/f/x_1.json")],
            )
            .unwrap();

        let all = history.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].operation, Operation::Move);
        assert_eq!(all[1].results.len(), 2);

        let recent = history.get_recent(1).unwrap();
        assert_eq!(recent[0].operation, Operation::Split);
    }

    #[test]
    fn test_disabled_history_writes_nothing() {
        let history = History::disabled();
        history.record(Operation::Rename, Path::new("a"), &[PathBuf::from("a.png")]).unwrap();
        assert!(history.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_undo_restores_and_marks() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("h.jsonl"));
        let original = dir.path().join("frame");
        let renamed = dir.path().join("frame.png");
        fs::write(&renamed, b"pixels").unwrap();
        history.record(Operation::Rename, &original, &[renamed.clone()]).unwrap();

        let outcomes = undo_recent(&history, 1, false).unwrap();
        assert!(matches!(outcomes[0], UndoOutcome::Restored { .. }));
        assert_eq!(fs::read(&original).unwrap(), b"pixels");
        assert!(!renamed.exists());
        assert!(history.get_undoable().unwrap().is_empty());
    }

    #[test]
    fn test_undo_skips_split_and_respects_occupied() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("h.jsonl"));
        let a = dir.path().join("a");
        let a_png = dir.path().join("a.png");
        fs::write(&a, b"new").unwrap();
        fs::write(&a_png, b"old").unwrap();
        history.record(Operation::Rename, &a, &[a_png.clone()]).unwrap();
        history.record(Operation::Split, &dir.path().join("x.json"), &[]).unwrap();

        let outcomes = undo_recent(&history, 1, false).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], UndoOutcome::Irreversible { .. }));
        assert!(matches!(outcomes[1], UndoOutcome::Occupied { .. }));
        assert_eq!(fs::read(&a_png).unwrap(), b"old");
    }

    #[test]
    fn test_undo_dry_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("h.jsonl"));
        let src = dir.path().join("1.png");
        let dst = dir.path().join("moved.png");
        fs::write(&dst, b"x").unwrap();
        history.record(Operation::Move, &src, &[dst.clone()]).unwrap();

        let outcomes = undo_recent(&history, 5, true).unwrap();
        assert!(matches!(outcomes[0], UndoOutcome::WouldRestore { .. }));
        assert!(dst.exists());
        assert_eq!(history.get_undoable().unwrap().len(), 1);
    }

    #[test]
    fn test_log_and_extra_files_are_protected() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("h.jsonl")).protecting(&dir.path().join("cfg.json"));

        // The log does not exist yet and is still recognised.
        assert!(history.is_protected(&dir.path().join("h.jsonl")));
        assert!(history.is_protected(&dir.path().join(".").join("cfg.json")));
        assert!(!history.is_protected(&dir.path().join("frame.png")));

        let mut names = vec!["cfg.json".to_string(), "frame.png".to_string(), "h.jsonl".to_string()];
        let taken = history.take_protected(dir.path(), &mut names);
        assert_eq!(taken, vec!["cfg.json", "h.jsonl"]);
        assert_eq!(names, vec!["frame.png"]);
    }

    #[test]
    fn test_disabled_history_protects_only_what_it_is_given() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::disabled();
        assert!(!history.is_protected(&dir.path().join("h.jsonl")));

        let history = history.protecting(&dir.path().join("cfg.json"));
        assert!(history.is_protected(&dir.path().join("cfg.json")));
    }
}
