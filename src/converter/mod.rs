//! Converter contract and registry.
//!
//! A converter is a pluggable unit that turns source assets of known
//! extensions into build outputs. The registry is an explicitly
//! constructed, process-lifetime mapping from plugin name to converter;
//! there is no dynamic discovery. The built-in `copyfile` converter is
//! always present and acts as the catch-all fallback.

use crate::config::BakeryConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub mod copyfile;

pub use copyfile::CopyFile;

/// Name of the always-available pass-through converter.
pub const COPYFILE: &str = "copyfile";

/// One produced output, as reported by a converter.
///
/// All paths are relative: `input_file` and `dependencies` to the asset
/// root, `output_file` to the export root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    /// Primary source file for this output
    pub input_file: String,
    /// Produced output file; unique key in the build database
    pub output_file: String,
    /// Extra files the output depends on, beyond the primary input
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Error raised by a converter invocation.
///
/// Distinct from a zero-record success: returning `Err` aborts the whole
/// build.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// IO error while reading sources or writing outputs
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Conversion failed for a converter-specific reason
    #[error("{0}")]
    Failed(String),
}

/// The capability every converter implements.
///
/// Implementations must be safe to invoke from worker threads (no shared
/// mutable state beyond the passed arguments), must create missing
/// destination directories, and must be idempotent: re-converting an
/// already-converted file and overwriting its output is safe. A converter
/// wrapping a non-reentrant native tool should shell out to its own
/// subprocess rather than call into the library in-process.
pub trait Convert: Send + Sync {
    /// Convert a non-empty batch of absolute source paths.
    ///
    /// Returns one record per file an output was actually produced for.
    fn convert(
        &self,
        config: &BakeryConfig,
        options: &toml::Table,
        src_dir: &Path,
        dst_dir: &Path,
        files: &[PathBuf],
    ) -> Result<Vec<ConversionRecord>, ConvertError>;
}

/// Immutable converter descriptor: routing metadata plus the invokable
/// conversion function.
#[derive(Clone)]
pub struct Converter {
    name: String,
    supported_extensions: Vec<String>,
    output_extension: Option<String>,
    batch_size: usize,
    function: Arc<dyn Convert>,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("name", &self.name)
            .field("supported_extensions", &self.supported_extensions)
            .field("output_extension", &self.output_extension)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Converter {
    /// Create a descriptor with no extensions, no output extension, and a
    /// batch size of one.
    pub fn new(name: impl Into<String>, function: Arc<dyn Convert>) -> Self {
        Self {
            name: name.into(),
            supported_extensions: vec![],
            output_extension: None,
            batch_size: 1,
            function,
        }
    }

    /// Set the supported source extensions (full multi-dot suffixes with
    /// leading dot, e.g. `.blend` or `.egg.pz`).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the fixed output extension (with leading dot). Without one the
    /// converter keeps the source's relative path unchanged.
    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = Some(extension.into());
        self
    }

    /// Set the maximum number of files per job.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Converter name, used for config lookup and job labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Supported source extensions.
    pub fn supported_extensions(&self) -> &[String] {
        &self.supported_extensions
    }

    /// Fixed output extension, if any.
    pub fn output_extension(&self) -> Option<&str> {
        self.output_extension.as_deref()
    }

    /// Maximum batch size per job.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Invoke the conversion function.
    pub fn convert(
        &self,
        config: &BakeryConfig,
        options: &toml::Table,
        src_dir: &Path,
        dst_dir: &Path,
        files: &[PathBuf],
    ) -> Result<Vec<ConversionRecord>, ConvertError> {
        self.function.convert(config, options, src_dir, dst_dir, files)
    }
}

/// Explicit name-to-converter registry, built once at build start and
/// threaded through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ConverterRegistry {
    converters: Vec<Converter>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry containing the built-in converters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(copyfile::converter());
        registry
    }

    /// Register a converter. A later registration with the same name
    /// replaces the earlier one.
    pub fn register(&mut self, converter: Converter) {
        self.converters.retain(|c| c.name != converter.name);
        self.converters.push(converter);
    }

    /// Look up a converter by name.
    pub fn get(&self, name: &str) -> Option<&Converter> {
        self.converters.iter().find(|c| c.name == name)
    }

    /// All registered converters, in registration order.
    pub fn converters(&self) -> &[Converter] {
        &self.converters
    }

    /// Converters enabled for this build. The pass-through copier is
    /// always included, whether listed or not.
    pub fn enabled(&self, plugin_names: &[String]) -> Vec<Converter> {
        self.converters
            .iter()
            .filter(|c| c.name == COPYFILE || plugin_names.iter().any(|n| n == &c.name))
            .cloned()
            .collect()
    }

    /// The pass-through copy converter.
    pub fn copyfile(&self) -> Converter {
        self.get(COPYFILE).cloned().unwrap_or_else(copyfile::converter)
    }
}
