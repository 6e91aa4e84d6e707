//! Stream planning: grouping discovered files into converter-bound
//! batches.
//!
//! Two mutually exclusive modes per build:
//!
//! - **Implicit**: discover the whole asset tree, route each file by its
//!   extension to the converter claiming it (the pass-through copier
//!   catches everything unclaimed), then split override-matched files
//!   into their own streams.
//! - **Explicit**: one stream per `[[build.streams]]` entry, with the
//!   entry's own include/exclude patterns and option overlay.

use crate::build::context::BuildContext;
use crate::build::discovery::{gather_files, DiscoveryError, INCLUDE_ALL};
use crate::build::progress::{ProgressEvent, ProgressReporter};
use crate::config::merge_tables;
use crate::converter::{Converter, COPYFILE};
use glob::Pattern;
use std::path::{Path, PathBuf};

/// Key inside a plugin options block holding its override list.
const OVERRIDES_KEY: &str = "overrides";

/// Key inside an override entry holding its glob pattern.
const PATTERN_KEY: &str = "pattern";

/// A converter-bound batch of source files sharing one set of effective
/// options. Streams are ephemeral and rebuilt every build invocation.
#[derive(Debug, Clone)]
pub struct Stream {
    /// Plugin name this stream was routed to
    pub plugin: String,
    /// Resolved converter; `None` when an explicit stream names an
    /// unknown plugin, which the scheduler rejects before running jobs
    pub converter: Option<Converter>,
    /// Absolute source paths; a file belongs to exactly one implicit stream
    pub files: Vec<PathBuf>,
    /// Effective options: base plugin config overlaid by the override or
    /// explicit-entry options
    pub options: toml::Table,
}

/// Plan the streams for this build.
///
/// Explicit mode is selected when the configuration declares any
/// `[[build.streams]]` entries, implicit mode otherwise.
pub fn plan_streams(
    ctx: &BuildContext,
    converters: &[Converter],
    reporter: &dyn ProgressReporter,
) -> Result<Vec<Stream>, DiscoveryError> {
    if ctx.config().build.streams.is_empty() {
        implicit_streams(ctx, converters, reporter)
    } else {
        explicit_streams(ctx, converters, reporter)
    }
}

/// The extension used for routing: the full multi-dot suffix of the file
/// name after its first dot (`model.egg.pz` routes by `.egg.pz`).
pub fn file_extension(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    name.find('.').map(|idx| name[idx..].to_string())
}

fn matches(pattern: &Pattern, src_dir: &Path, file: &Path) -> bool {
    let rel = file.strip_prefix(src_dir).unwrap_or(file).to_string_lossy().into_owned();
    let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    pattern.matches(&rel) || pattern.matches(&name)
}

/// Base options for a plugin: its config block minus the override list,
/// which is planner metadata rather than a converter option.
fn base_options(ctx: &BuildContext, plugin: &str) -> toml::Table {
    let mut options = ctx.plugin_options(plugin);
    options.remove(OVERRIDES_KEY);
    options
}

fn implicit_streams(
    ctx: &BuildContext,
    converters: &[Converter],
    reporter: &dyn ProgressReporter,
) -> Result<Vec<Stream>, DiscoveryError> {
    let ignore_patterns = &ctx.config().build.ignore_patterns;
    if !ignore_patterns.is_empty() {
        reporter.report(ProgressEvent::Notice {
            message: format!("Ignoring file patterns: {:?}", ignore_patterns),
        });
    }

    let found = gather_files(
        &ctx.asset_dir(),
        &[INCLUDE_ALL.to_string()],
        ignore_patterns,
        reporter,
    )?;

    // Map each extension to its owning converter; later registrations win.
    let mut owners: Vec<(&str, usize)> = Vec::new();
    for (idx, converter) in converters.iter().enumerate() {
        for ext in converter.supported_extensions() {
            owners.retain(|(e, _)| e != ext);
            owners.push((ext, idx));
        }
    }

    let fallback = converters.iter().position(|c| c.name() == COPYFILE);
    let mut candidates: Vec<Vec<PathBuf>> = vec![Vec::new(); converters.len()];

    for file in found {
        let owner = file_extension(&file)
            .and_then(|ext| owners.iter().find(|(e, _)| *e == ext).map(|(_, idx)| *idx))
            .or(fallback);
        match owner {
            Some(idx) => candidates[idx].push(file),
            None => reporter.report(ProgressEvent::Warning {
                message: format!("No converter for {}", file.display()),
            }),
        }
    }

    let mut streams = Vec::new();
    for (converter, files) in converters.iter().zip(candidates) {
        if files.is_empty() {
            continue;
        }
        streams.extend(partition_overrides(ctx, converter, files, reporter)?);
    }

    Ok(streams)
}

/// Split a converter's candidate files by its configured overrides.
///
/// Overrides are evaluated in declared order and a file joins at most one
/// override stream (first match wins); unmatched files form the base
/// stream. The emitted streams are pairwise disjoint and cover the whole
/// candidate set.
fn partition_overrides(
    ctx: &BuildContext,
    converter: &Converter,
    files: Vec<PathBuf>,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<Stream>, DiscoveryError> {
    let src_dir = ctx.asset_dir();
    let block = ctx.plugin_options(converter.name());
    let base = base_options(ctx, converter.name());

    let overrides: Vec<toml::Table> = match block.get(OVERRIDES_KEY) {
        Some(toml::Value::Array(entries)) => entries
            .iter()
            .filter_map(|v| v.as_table().cloned())
            .collect(),
        _ => vec![],
    };

    let mut streams = Vec::new();
    let mut remaining = files;

    for entry in overrides {
        let Some(pattern_str) = entry.get(PATTERN_KEY).and_then(|v| v.as_str()) else {
            reporter.report(ProgressEvent::Warning {
                message: format!(
                    "{}: override entry without a pattern, skipping",
                    converter.name()
                ),
            });
            continue;
        };
        let pattern = Pattern::new(pattern_str)
            .map_err(|e| DiscoveryError::InvalidPattern(pattern_str.to_string(), e))?;

        let (matched, rest): (Vec<_>, Vec<_>) =
            remaining.into_iter().partition(|f| matches(&pattern, &src_dir, f));
        remaining = rest;

        if matched.is_empty() {
            continue;
        }

        let mut overlay = entry.clone();
        overlay.remove(PATTERN_KEY);

        reporter.report(ProgressEvent::Notice {
            message: format!(
                "{}: applying override {} to {} file(s)",
                converter.name(),
                pattern_str,
                matched.len()
            ),
        });

        streams.push(Stream {
            plugin: converter.name().to_string(),
            converter: Some(converter.clone()),
            files: matched,
            options: merge_tables(&base, &overlay),
        });
    }

    if !remaining.is_empty() {
        streams.push(Stream {
            plugin: converter.name().to_string(),
            converter: Some(converter.clone()),
            files: remaining,
            options: base,
        });
    }

    Ok(streams)
}

fn explicit_streams(
    ctx: &BuildContext,
    converters: &[Converter],
    reporter: &dyn ProgressReporter,
) -> Result<Vec<Stream>, DiscoveryError> {
    let src_dir = ctx.asset_dir();
    let mut streams = Vec::new();

    for entry in &ctx.config().build.streams {
        let files =
            gather_files(&src_dir, &entry.include_patterns, &entry.exclude_patterns, reporter)?;

        let converter = converters.iter().find(|c| c.name() == entry.plugin).cloned();
        if converter.is_none() {
            reporter.report(ProgressEvent::Warning {
                message: format!("Failed to find plugin ({}) for stream", entry.plugin),
            });
        }

        streams.push(Stream {
            plugin: entry.plugin.clone(),
            converter,
            files,
            options: merge_tables(&base_options(ctx, &entry.plugin), &entry.options),
        });
    }

    Ok(streams)
}
