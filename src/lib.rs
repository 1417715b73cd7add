// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! mandeltidy: housekeeping for Mandelbrot render output
//!
//! Moves rendered frames out of an overcrowded folder, relabels them for
//! video encoders, and splits frame-data JSON files that grew too large.

pub mod config;
pub mod error;
pub mod history;
pub mod listing;
pub mod mover;
pub mod nonfinite;
pub mod renamer;
pub mod splitter;
pub mod watcher;

pub use config::AppConfig;
pub use error::{Result, TidyError};
