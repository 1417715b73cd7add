// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for mandeltidy

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Frame mover settings
    #[serde(default)]
    pub mover: MoverConfig,

    /// Frame renamer settings
    #[serde(default)]
    pub renamer: RenamerConfig,

    /// Frame data splitter settings
    #[serde(default)]
    pub splitter: SplitterConfig,

    /// History log settings
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MoverConfig {
    #[serde(default = "default_mover_source")]
    pub source: String,
    #[serde(default = "default_mover_destination")]
    pub destination: String,
    #[serde(default = "default_image_pattern")]
    pub pattern: String,
    /// Number of matching files that triggers a move in watch mode
    #[serde(default = "default_watch_threshold")]
    pub watch_threshold: usize,
    /// Upper bound on waiting for the newest frame to stop growing
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RenamerConfig {
    #[serde(default = "default_image_dir")]
    pub directory: String,
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    /// Entries considered by `renumber`
    #[serde(default = "default_image_pattern")]
    pub pattern: String,
    #[serde(default = "default_pad_width")]
    pub pad_width: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SplitterConfig {
    #[serde(default = "default_data_dir")]
    pub directory: String,
    #[serde(default = "default_json_pattern")]
    pub pattern: String,
    #[serde(default = "default_frame_side")]
    pub width: u32,
    #[serde(default = "default_frame_side")]
    pub height: u32,
    #[serde(default = "default_accepted_lengths")]
    pub accepted_lengths: Vec<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_history_path")]
    pub path: String,
}

// Default value functions
fn default_mover_source() -> String { "./imgs".to_string() }
fn default_mover_destination() -> String { "./imgs2".to_string() }
fn default_image_dir() -> String { "./imgs".to_string() }
fn default_data_dir() -> String { "./files".to_string() }
fn default_image_pattern() -> String { "*.png".to_string() }
fn default_json_pattern() -> String { "*.json".to_string() }
fn default_watch_threshold() -> usize { 1000 }
fn default_settle_secs() -> u64 { 10 }
fn default_suffix() -> String { ".png".to_string() }
fn default_exclude() -> Vec<String> { vec!["*.DS_Store".to_string()] }
fn default_pad_width() -> usize { 6 }
fn default_frame_side() -> u32 { 900 }
fn default_accepted_lengths() -> Vec<usize> { vec![100, 101] }
fn default_true() -> bool { true }
fn default_history_path() -> String { "mandeltidy_history.jsonl".to_string() }

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            source: default_mover_source(),
            destination: default_mover_destination(),
            pattern: default_image_pattern(),
            watch_threshold: default_watch_threshold(),
            settle_secs: default_settle_secs(),
        }
    }
}

impl Default for RenamerConfig {
    fn default() -> Self {
        Self {
            directory: default_image_dir(),
            suffix: default_suffix(),
            exclude: default_exclude(),
            pattern: default_image_pattern(),
            pad_width: default_pad_width(),
        }
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            directory: default_data_dir(),
            pattern: default_json_pattern(),
            width: default_frame_side(),
            height: default_frame_side(),
            accepted_lengths: default_accepted_lengths(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_history_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::TidyError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that serde alone cannot reject
    pub fn validate(&self) -> crate::Result<()> {
        for pattern in [&self.mover.pattern, &self.renamer.pattern, &self.splitter.pattern]
            .into_iter()
            .chain(self.renamer.exclude.iter())
        {
            glob::Pattern::new(pattern)?;
        }

        if self.renamer.suffix.is_empty() {
            return Err(crate::TidyError::Config("renamer.suffix must not be empty".to_string()));
        }
        if self.renamer.pad_width == 0 {
            return Err(crate::TidyError::Config("renamer.pad_width must be at least 1".to_string()));
        }
        if self.mover.watch_threshold == 0 {
            return Err(crate::TidyError::Config("mover.watch_threshold must be at least 1".to_string()));
        }
        if self.splitter.accepted_lengths.iter().any(|&n| n < 2) {
            return Err(crate::TidyError::Config(
                "splitter.accepted_lengths entries must be at least 2".to_string(),
            ));
        }

        Ok(())
    }
}
