//! Configuration schema types for `bakery.toml`
//!
//! Defines the structure of a bakery project configuration. Converter
//! option blocks are free-form TOML tables so plugins can declare their
//! own settings without the core knowing their shape.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level project configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeryConfig {
    /// General project settings
    pub general: GeneralConfig,
    /// Build pipeline settings
    pub build: BuildConfig,
    /// Per-plugin option blocks (`[plugins.<name>]`), free-form
    pub plugins: toml::Table,
}

/// General section (`[general]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Emit extra diagnostics during a build
    pub verbose: bool,
    /// Names of enabled converter plugins
    pub plugins: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { verbose: false, plugins: vec![] }
    }
}

/// Build section (`[build]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory holding source assets, relative to the project root
    pub asset_dir: PathBuf,
    /// Directory receiving converted assets, relative to the project root
    pub export_dir: PathBuf,
    /// Glob patterns for files to skip during discovery
    pub ignore_patterns: Vec<String>,
    /// Worker pool size; zero or negative means "pick a default"
    pub jobs: i64,
    /// Show pending jobs in the progress display, not just running ones
    pub show_all_jobs: bool,
    /// Explicit stream definitions; empty selects implicit routing
    pub streams: Vec<StreamConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets"),
            export_dir: PathBuf::from(".built_assets"),
            ignore_patterns: vec![],
            jobs: 0,
            show_all_jobs: false,
            streams: vec![],
        }
    }
}

/// One explicit stream entry (`[[build.streams]]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Name of the converter plugin handling this stream
    pub plugin: String,
    /// Include glob patterns for this stream
    pub include_patterns: Vec<String>,
    /// Exclude glob patterns for this stream
    pub exclude_patterns: Vec<String>,
    /// Option overlay applied on top of the plugin's base options
    pub options: toml::Table,
}
