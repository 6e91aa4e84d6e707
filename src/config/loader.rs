//! Configuration loading and discovery for `bakery.toml`
//!
//! Provides functions to find, load, and merge configuration. Option
//! layering follows a simple rule: later layers win per key, and nested
//! tables are merged recursively.

use super::schema::BakeryConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILENAME: &str = "bakery.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse bakery.toml: {0}")]
    Parse(#[from] toml::de::Error),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the asset source directory
    pub asset_dir: Option<PathBuf>,
    /// Override the export directory
    pub export_dir: Option<PathBuf>,
    /// Override the worker pool size
    pub jobs: Option<i64>,
    /// Force verbose output
    pub verbose: Option<bool>,
}

/// Find `bakery.toml` by walking up from the current working directory.
///
/// # Returns
/// - `Some(path)` if a config file is found
/// - `None` if no config file is found
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find `bakery.toml` by walking up from a specific directory.
///
/// Separated from [`find_config`] so tests can pin the start directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a file, or return defaults when `path` is None.
pub fn load_config(path: Option<&Path>) -> Result<BakeryConfig, ConfigError> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            Ok(toml::from_str(&text)?)
        }
        None => Ok(default_config()),
    }
}

/// Create a default configuration.
pub fn default_config() -> BakeryConfig {
    BakeryConfig::default()
}

/// Apply CLI overrides on top of a loaded configuration.
pub fn merge_cli_overrides(config: &mut BakeryConfig, overrides: &CliOverrides) {
    if let Some(asset_dir) = &overrides.asset_dir {
        config.build.asset_dir = asset_dir.clone();
    }
    if let Some(export_dir) = &overrides.export_dir {
        config.build.export_dir = export_dir.clone();
    }
    if let Some(jobs) = overrides.jobs {
        config.build.jobs = jobs;
    }
    if let Some(verbose) = overrides.verbose {
        config.general.verbose = verbose;
    }
}

/// Deep-merge two option tables: `overlay` wins per key, nested tables
/// merge recursively, everything else is replaced wholesale.
pub fn merge_tables(base: &toml::Table, overlay: &toml::Table) -> toml::Table {
    let mut merged = base.clone();

    for (key, value) in overlay {
        match (merged.get_mut(key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                *existing = merge_tables(existing, incoming);
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn table(text: &str) -> toml::Table {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_find_config_from_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let config_path = temp.path().join(CONFIG_FILENAME);
        fs::File::create(&config_path).unwrap().write_all(b"").unwrap();

        let found = find_config_from(nested).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_find_config_from_missing() {
        let temp = TempDir::new().unwrap();
        assert!(find_config_from(temp.path().to_path_buf()).is_none());
    }

    #[test]
    fn test_load_config_none_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.build.asset_dir, PathBuf::from("assets"));
    }

    #[test]
    fn test_load_config_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "not [valid toml").unwrap();

        let result = load_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = default_config();
        let overrides = CliOverrides {
            asset_dir: Some(PathBuf::from("art")),
            jobs: Some(8),
            verbose: Some(true),
            ..Default::default()
        };
        merge_cli_overrides(&mut config, &overrides);

        assert_eq!(config.build.asset_dir, PathBuf::from("art"));
        assert_eq!(config.build.jobs, 8);
        assert!(config.general.verbose);
        assert_eq!(config.build.export_dir, PathBuf::from(".built_assets"));
    }

    #[test]
    fn test_merge_tables_later_wins() {
        let base = table("quality = \"high\"\nscale = 1");
        let overlay = table("quality = \"low\"");

        let merged = merge_tables(&base, &overlay);
        assert_eq!(merged.get("quality").unwrap().as_str(), Some("low"));
        assert_eq!(merged.get("scale").unwrap().as_integer(), Some(1));
    }

    #[test]
    fn test_merge_tables_deep() {
        let base = table("[textures]\nformat = \"png\"\nmipmaps = true");
        let overlay = table("[textures]\nformat = \"ktx\"");

        let merged = merge_tables(&base, &overlay);
        let textures = merged.get("textures").unwrap().as_table().unwrap();
        assert_eq!(textures.get("format").unwrap().as_str(), Some("ktx"));
        assert_eq!(textures.get("mipmaps").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn test_merge_tables_type_replacement() {
        let base = table("value = 1");
        let overlay = table("[value]\nnested = true");

        let merged = merge_tables(&base, &overlay);
        assert!(merged.get("value").unwrap().is_table());
    }
}
