//! Configuration module for the bakery build system
//!
//! Provides types and parsing for `bakery.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{
    default_config, find_config, find_config_from, load_config, merge_cli_overrides,
    merge_tables, CliOverrides, ConfigError, CONFIG_FILENAME,
};
pub use schema::*;
