//! Pass-through copy converter.
//!
//! The fallback for files no dedicated converter claims: bytes are copied
//! unchanged, preserving the path relative to the asset root.

use super::{Convert, ConversionRecord, ConvertError, Converter, COPYFILE};
use crate::config::BakeryConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Byte-copy converter preserving relative paths.
#[derive(Debug, Default)]
pub struct CopyFile;

impl Convert for CopyFile {
    fn convert(
        &self,
        _config: &BakeryConfig,
        _options: &toml::Table,
        src_dir: &Path,
        dst_dir: &Path,
        files: &[PathBuf],
    ) -> Result<Vec<ConversionRecord>, ConvertError> {
        let mut results = Vec::with_capacity(files.len());

        for src in files {
            let rel = src.strip_prefix(src_dir).map_err(|_| {
                ConvertError::Failed(format!(
                    "file {} is outside the asset directory {}",
                    src.display(),
                    src_dir.display()
                ))
            })?;
            let dst = dst_dir.join(rel);

            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(src, &dst)?;

            let rel = rel.to_string_lossy().into_owned();
            results.push(ConversionRecord {
                input_file: rel.clone(),
                output_file: rel,
                dependencies: vec![],
            });
        }

        Ok(results)
    }
}

/// Descriptor for the built-in copy converter: no claimed extensions
/// (catch-all fallback), no output extension, default batch size.
pub fn converter() -> Converter {
    Converter::new(COPYFILE, Arc::new(CopyFile))
}
