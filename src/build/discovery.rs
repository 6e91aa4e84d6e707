//! Source file discovery for the build system.
//!
//! Walks the asset tree and applies include/exclude glob filters with
//! shell-glob semantics (`*`, `?`, `[...]`). A pattern matches a file if
//! it matches either the path relative to the source root or the bare
//! filename; exclusion takes precedence over inclusion.

use crate::build::progress::{ProgressEvent, ProgressReporter};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
    /// IO error during file enumeration
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

/// Include pattern matching every file (minus exclusions).
pub const INCLUDE_ALL: &str = "*";

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, DiscoveryError> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| DiscoveryError::InvalidPattern(p.clone(), e)))
        .collect()
}

/// Check a file against a pattern list: relative path or bare filename.
fn matches_any(patterns: &[Pattern], rel: &str, name: &str) -> Option<usize> {
    // Shell-glob semantics: `*` crosses directory separators, as in fnmatch.
    let options = MatchOptions { require_literal_separator: false, ..MatchOptions::new() };
    patterns
        .iter()
        .position(|p| p.matches_with(rel, options) || p.matches_with(name, options))
}

/// Discover files under `src_dir` matching the include patterns and none
/// of the exclude patterns.
///
/// A nonexistent source root yields an empty set; the caller is expected
/// to warn about it up front. Skipped files are reported as verbose
/// notices naming the exclude pattern that matched. Results are sorted
/// for determinism.
pub fn gather_files(
    src_dir: &Path,
    include_patterns: &[String],
    exclude_patterns: &[String],
    reporter: &dyn ProgressReporter,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let includes = compile(include_patterns)?;
    let excludes = compile(exclude_patterns)?;

    let mut found = Vec::new();
    walk(src_dir, &mut |path| {
        let rel = path.strip_prefix(src_dir).unwrap_or(&path).to_string_lossy().into_owned();
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

        if matches_any(&includes, &rel, &name).is_none() {
            return;
        }

        if let Some(idx) = matches_any(&excludes, &rel, &name) {
            reporter.report(ProgressEvent::Notice {
                message: format!(
                    "Skip building file {} that matched ignore pattern {}",
                    rel, exclude_patterns[idx]
                ),
            });
            return;
        }

        found.push(path);
    })?;

    found.sort();
    Ok(found)
}

/// Recursively visit every file under `root`. A missing root is not an
/// error: the walk simply visits nothing.
fn walk(root: &Path, visit: &mut impl FnMut(PathBuf)) -> std::io::Result<()> {
    if !root.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, visit)?;
        } else {
            visit(path);
        }
    }

    Ok(())
}
