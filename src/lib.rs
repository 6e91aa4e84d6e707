//! bakery - Incremental asset build orchestrator for game projects
//!
//! This library provides functionality to:
//! - Discover source assets and route them to converter plugins
//! - Skip work whose outputs are already up to date
//! - Run conversion jobs on a bounded worker pool
//! - Persist per-output conversion records between builds

pub mod build;
pub mod cli;
pub mod config;
pub mod converter;
