// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sorted directory listings filtered by glob patterns

use glob::Pattern;
use std::path::Path;
use tracing::warn;

use crate::Result;

/// Compile a file name pattern such as `*.png`
pub fn compile(pattern: &str) -> Result<Pattern> {
    Ok(Pattern::new(pattern)?)
}

/// Compile a list of patterns
pub fn compile_all(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns.iter().map(|p| compile(p)).collect()
}

/// Names of all entries in `dir`, sorted lexicographically.
///
/// Entries whose names are not valid UTF-8 cannot be matched against
/// patterns or have text appended, so they are left alone.
pub fn list_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!("Skipping non UTF-8 entry {:?} in {:?}", raw, dir),
        }
    }

    names.sort();
    Ok(names)
}

/// Sorted names in `dir` matching `pattern`
pub fn list_matching(dir: &Path, pattern: &Pattern) -> Result<Vec<String>> {
    Ok(list_names(dir)?
        .into_iter()
        .filter(|name| pattern.matches(name))
        .collect())
}

/// Sorted names in `dir` matching none of `excludes`
pub fn list_excluding(dir: &Path, excludes: &[Pattern]) -> Result<Vec<String>> {
    Ok(list_names(dir)?
        .into_iter()
        .filter(|name| !excludes.iter().any(|p| p.matches(name)))
        .collect())
}
