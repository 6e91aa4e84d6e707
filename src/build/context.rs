//! Build context containing configuration and paths for a build.

use crate::build::database::DATABASE_FILENAME;
use crate::config::BakeryConfig;
use std::path::{Path, PathBuf};

/// Build context threaded through every pipeline component.
///
/// Holds the loaded configuration and the project root, and resolves the
/// asset, export, and database paths from them.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: BakeryConfig,
    /// Project root directory (where bakery.toml is located)
    project_root: PathBuf,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: BakeryConfig, project_root: PathBuf) -> Self {
        let verbose = config.general.verbose;
        Self { config, project_root, verbose }
    }

    /// Get the configuration.
    pub fn config(&self) -> &BakeryConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the asset source directory (resolved to an absolute path).
    pub fn asset_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.build.asset_dir)
    }

    /// Get the export directory (resolved to an absolute path).
    pub fn export_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.build.export_dir)
    }

    /// Get the on-disk location of the build database.
    pub fn database_path(&self) -> PathBuf {
        self.project_root.join(DATABASE_FILENAME)
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Options block for a plugin (`[plugins.<name>]`), empty if absent.
    pub fn plugin_options(&self, name: &str) -> toml::Table {
        match self.config.plugins.get(name) {
            Some(toml::Value::Table(table)) => table.clone(),
            _ => toml::Table::new(),
        }
    }

    /// Resolve a path relative to the project root.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
