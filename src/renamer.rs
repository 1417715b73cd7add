// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Relabels rendered frames so video encoders accept them
//!
//! Two passes are available: appending a fixed suffix to every name, and
//! renumbering frames into a zero-padded sequence ordered by frame number.

use glob::Pattern;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::history::{History, Operation};
use crate::listing;
use crate::{Result, TidyError};

/// A single planned or completed rename
#[derive(Debug, Clone, Serialize)]
pub struct RenamedFile {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Result of a rename pass
#[derive(Debug, Clone, Serialize, Default)]
pub struct RenameReport {
    pub dry_run: bool,
    pub renamed: Vec<RenamedFile>,
    /// Names that were left alone
    pub skipped: Vec<String>,
}

/// Append `suffix` to the name of every entry in `dir` not matching `excludes`.
///
/// This is a plain string append; content is never inspected.
pub fn append_suffix(
    dir: &Path,
    excludes: &[Pattern],
    suffix: &str,
    history: &History,
    dry_run: bool,
) -> Result<RenameReport> {
    let mut names = listing::list_excluding(dir, excludes)?;
    let mut report = RenameReport { dry_run, ..Default::default() };
    report.skipped = history.take_protected(dir, &mut names);

    for name in names {
        let from = dir.join(&name);
        let to = dir.join(format!("{}{}", name, suffix));

        if to.exists() {
            return Err(TidyError::DestinationExists(to));
        }

        if dry_run {
            info!("DRY RUN: Would rename {:?} to {:?}", from, to);
        } else {
            std::fs::rename(&from, &to)?;
            history.record(Operation::Rename, &from, std::slice::from_ref(&to))?;
            debug!("Renamed {:?} -> {:?}", from, to);
        }

        report.renamed.push(RenamedFile { from, to });
    }

    info!(
        "{} {} file(s) in {:?}",
        if dry_run { "Would rename" } else { "Renamed" },
        report.renamed.len(),
        dir
    );

    Ok(report)
}

/// Frame number parsed from names like `3_1_17.png`
///
/// Compares piece by piece as integers, so `2_0_1` sorts before `10_0_0`.
pub fn frame_key(name: &str) -> Option<Vec<u64>> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    stem.split('_').map(|piece| piece.parse().ok()).collect()
}

/// Renumber entries matching `pattern` to `000000.png`, `000001.png`, ...
///
/// Order follows [`frame_key`]. Names without a frame key are skipped. The
/// extension of each entry is kept.
pub fn renumber(
    dir: &Path,
    pattern: &Pattern,
    width: usize,
    history: &History,
    dry_run: bool,
) -> Result<RenameReport> {
    let mut names = listing::list_matching(dir, pattern)?;
    let mut report = RenameReport { dry_run, ..Default::default() };
    report.skipped = history.take_protected(dir, &mut names);

    let mut frames = Vec::new();
    for name in names {
        match frame_key(&name) {
            Some(key) => frames.push((key, name)),
            None => {
                warn!("No frame number in {:?}, leaving it alone", name);
                report.skipped.push(name);
            }
        }
    }
    frames.sort();

    let batch: HashSet<&str> = frames.iter().map(|(_, name)| name.as_str()).collect();
    let mut plan = Vec::with_capacity(frames.len());

    for (index, (_, name)) in frames.iter().enumerate() {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let target = format!("{:0width$}{}", index, extension, width = width);

        if target == *name {
            continue;
        }
        if !batch.contains(target.as_str()) && dir.join(&target).exists() {
            return Err(TidyError::DestinationExists(dir.join(&target)));
        }
        plan.push((name.as_str(), target));
    }

    if dry_run {
        for (name, target) in &plan {
            info!("DRY RUN: Would rename {:?} to {:?}", name, target);
            report.renamed.push(RenamedFile { from: dir.join(name), to: dir.join(target) });
        }
        return Ok(report);
    }

    // Park every file under a temporary name first so that a target equal
    // to another entry's current name never overwrites it.
    let temps: Vec<PathBuf> = (0..plan.len())
        .map(|index| dir.join(format!(".mandeltidy-renumber-{}.tmp", index)))
        .collect();
    if let Some(taken) = temps.iter().find(|temp| temp.exists()) {
        return Err(TidyError::DestinationExists(taken.clone()));
    }

    let mut parked: Vec<Parked> = Vec::with_capacity(plan.len());
    for ((name, target), temp) in plan.iter().zip(temps) {
        let from = dir.join(name);
        if let Err(e) = std::fs::rename(&from, &temp) {
            unpark(&parked);
            return Err(e.into());
        }
        parked.push(Parked { from, temp, to: dir.join(target) });
    }

    for (done, entry) in parked.iter().enumerate() {
        let finished = std::fs::rename(&entry.temp, &entry.to)
            .map_err(TidyError::from)
            .and_then(|()| history.record(Operation::Renumber, &entry.from, std::slice::from_ref(&entry.to)));
        if let Err(e) = finished {
            unpark(&parked[done..]);
            return Err(e);
        }
        debug!("Renumbered {:?} -> {:?}", entry.from, entry.to);
        report.renamed.push(RenamedFile { from: entry.from.clone(), to: entry.to.clone() });
    }

    info!("Renumbered {} file(s) in {:?}", report.renamed.len(), dir);

    Ok(report)
}

/// A file moved aside during a renumber pass
struct Parked {
    from: PathBuf,
    temp: PathBuf,
    to: PathBuf,
}

/// Move parked files back to their original names after a failed pass.
///
/// A file whose original name is taken again stays parked and is logged.
fn unpark(parked: &[Parked]) {
    for entry in parked.iter().filter(|p| p.temp.exists()) {
        if entry.from.exists() {
            warn!("{:?} is taken, frame left at {:?}", entry.from, entry.temp);
            continue;
        }
        match std::fs::rename(&entry.temp, &entry.from) {
            Ok(()) => debug!("Restored {:?}", entry.from),
            Err(e) => warn!("Could not restore {:?} from {:?}: {}", entry.from, entry.temp, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names_in(dir: &Path) -> Vec<String> {
        listing::list_names(dir).unwrap()
    }

    #[test]
    fn test_append_suffix_skips_excluded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".DS_Store"), b"meta").unwrap();
        fs::write(dir.path().join("000001"), b"one").unwrap();
        fs::write(dir.path().join("000000"), b"zero").unwrap();

        let excludes = listing::compile_all(&["*.DS_Store".to_string()]).unwrap();
        let report = append_suffix(dir.path(), &excludes, ".png", &History::disabled(), false).unwrap();

        assert_eq!(report.renamed.len(), 2);
        assert_eq!(report.renamed[0].from, dir.path().join("000000"));
        assert_eq!(names_in(dir.path()), vec![".DS_Store", "000000.png", "000001.png"]);
        assert_eq!(fs::read(dir.path().join("000001.png")).unwrap(), b"one");
    }

    #[test]
    fn test_append_suffix_is_blind() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("frame.png"), b"x").unwrap();

        append_suffix(dir.path(), &[], ".png", &History::disabled(), false).unwrap();
        assert_eq!(names_in(dir.path()), vec!["frame.png.png"]);
    }

    #[test]
    fn test_append_suffix_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"new").unwrap();
        fs::write(dir.path().join("a.png"), b"old").unwrap();

        let err = append_suffix(dir.path(), &[], ".png", &History::disabled(), false).unwrap_err();
        assert!(matches!(err, TidyError::DestinationExists(_)));
        assert_eq!(fs::read(dir.path().join("a.png")).unwrap(), b"old");
    }

    #[test]
    fn test_frame_key() {
        assert_eq!(frame_key("3_1_17.png"), Some(vec![3, 1, 17]));
        assert_eq!(frame_key("000042.png"), Some(vec![42]));
        assert_eq!(frame_key("cover.png"), None);
        assert_eq!(frame_key("1__2.png"), None);
    }

    #[test]
    fn test_renumber_orders_numerically() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("10_0_0.png"), b"late").unwrap();
        fs::write(dir.path().join("2_0_1.png"), b"early").unwrap();
        fs::write(dir.path().join("cover.png"), b"skip").unwrap();

        let pattern = listing::compile("*.png").unwrap();
        let report = renumber(dir.path(), &pattern, 6, &History::disabled(), false).unwrap();

        assert_eq!(report.skipped, vec!["cover.png"]);
        assert_eq!(fs::read(dir.path().join("000000.png")).unwrap(), b"early");
        assert_eq!(fs::read(dir.path().join("000001.png")).unwrap(), b"late");
        assert!(dir.path().join("cover.png").exists());
    }

    #[test]
    fn test_renumber_handles_overlapping_names() {
        let dir = tempfile::tempdir().unwrap();
        // Every target is the current name of the next frame.
        fs::write(dir.path().join("000001.png"), b"a").unwrap();
        fs::write(dir.path().join("000002.png"), b"b").unwrap();
        fs::write(dir.path().join("000003.png"), b"c").unwrap();

        let pattern = listing::compile("*.png").unwrap();
        let report = renumber(dir.path(), &pattern, 6, &History::disabled(), false).unwrap();

        assert_eq!(report.renamed.len(), 3);
        assert_eq!(names_in(dir.path()), vec!["000000.png", "000001.png", "000002.png"]);
        assert_eq!(fs::read(dir.path().join("000000.png")).unwrap(), b"a");
        assert_eq!(fs::read(dir.path().join("000001.png")).unwrap(), b"b");
        assert_eq!(fs::read(dir.path().join("000002.png")).unwrap(), b"c");
    }

    #[test]
    fn test_renumber_refuses_outside_collision() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("7.png"), b"frame").unwrap();
        fs::write(dir.path().join("000000.png"), b"other").unwrap();

        // Only `7.png` is in the batch, so `000000.png` is a foreign file.
        let pattern = listing::compile("7.png").unwrap();
        let err = renumber(dir.path(), &pattern, 6, &History::disabled(), false).unwrap_err();
        assert!(matches!(err, TidyError::DestinationExists(_)));
        assert_eq!(fs::read(dir.path().join("7.png")).unwrap(), b"frame");
    }

    #[test]
    fn test_renumber_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("h.jsonl"));
        let frames = dir.path().join("imgs");
        fs::create_dir(&frames).unwrap();
        fs::write(frames.join("4.png"), b"x").unwrap();

        let pattern = listing::compile("*.png").unwrap();
        renumber(&frames, &pattern, 4, &history, false).unwrap();

        let entries = history.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, Operation::Renumber);
        assert_eq!(entries[0].results, vec![frames.join("0000.png")]);
    }

    #[test]
    fn test_renumber_leaves_everything_when_a_temp_name_is_taken() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("5.png"), b"five").unwrap();
        fs::write(dir.path().join("6.png"), b"six").unwrap();
        // Left behind by an earlier interrupted pass; only the second slot.
        fs::write(dir.path().join(".mandeltidy-renumber-1.tmp"), b"stale").unwrap();

        let pattern = listing::compile("*.png").unwrap();
        let err = renumber(dir.path(), &pattern, 6, &History::disabled(), false).unwrap_err();

        assert!(matches!(err, TidyError::DestinationExists(ref p) if p.ends_with(".mandeltidy-renumber-1.tmp")));
        assert_eq!(names_in(dir.path()), vec![".mandeltidy-renumber-1.tmp", "5.png", "6.png"]);
        assert_eq!(fs::read(dir.path().join("5.png")).unwrap(), b"five");
        assert_eq!(fs::read(dir.path().join(".mandeltidy-renumber-1.tmp")).unwrap(), b"stale");
    }

    #[test]
    fn test_unpark_restores_free_names_only() {
        let dir = tempfile::tempdir().unwrap();
        let park = |name: &str, index: usize| Parked {
            from: dir.path().join(name),
            temp: dir.path().join(format!(".mandeltidy-renumber-{}.tmp", index)),
            to: dir.path().join(format!("{:06}.png", index)),
        };
        let parked = vec![park("3.png", 0), park("4.png", 1), park("9.png", 2)];
        fs::write(&parked[0].temp, b"three").unwrap();
        fs::write(&parked[1].temp, b"four").unwrap();
        fs::write(dir.path().join("4.png"), b"newcomer").unwrap();
        // The third was already finished, so its temp is gone.

        unpark(&parked);

        assert_eq!(fs::read(dir.path().join("3.png")).unwrap(), b"three");
        assert_eq!(fs::read(dir.path().join("4.png")).unwrap(), b"newcomer");
        assert_eq!(fs::read(&parked[1].temp).unwrap(), b"four");
        assert!(!dir.path().join("9.png").exists());
    }

    #[test]
    fn test_history_and_config_files_are_not_renamed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mandeltidy_history.jsonl"), b"").unwrap();
        fs::write(dir.path().join("mandeltidy.json"), b"{}").unwrap();
        fs::write(dir.path().join("000000"), b"zero").unwrap();

        let history = History::new(dir.path().join("mandeltidy_history.jsonl"))
            .protecting(&dir.path().join("mandeltidy.json"));
        let report = append_suffix(dir.path(), &[], ".png", &history, false).unwrap();

        assert_eq!(report.renamed.len(), 1);
        assert_eq!(report.skipped, vec!["mandeltidy.json", "mandeltidy_history.jsonl"]);
        assert_eq!(
            names_in(dir.path()),
            vec!["000000.png", "mandeltidy.json", "mandeltidy_history.jsonl"]
        );
        assert_eq!(history.read_all().unwrap().len(), 1);
    }
}
