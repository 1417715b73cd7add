// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for mandeltidy

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mandeltidy operations
pub type Result<T> = std::result::Result<T, TidyError>;

/// mandeltidy error types
#[derive(Error, Debug)]
pub enum TidyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid frame record {path:?}: {source}")]
    InvalidRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Destination already exists: {0:?}")]
    DestinationExists(PathBuf),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}
