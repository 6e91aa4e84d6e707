//! Incremental up-to-date checks.
//!
//! A source file is skipped when its output already exists and is at
//! least as new as every dependency: the file itself plus whatever extra
//! dependencies its build-database record declares. Anything else (a
//! missing output, a newer dependency, an unreadable timestamp, no prior
//! record) forces reconversion.

use crate::build::database::BuildDatabase;
use crate::build::progress::{ProgressEvent, ProgressReporter};
use crate::converter::Converter;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The relative output path a converter would produce for a source file.
///
/// The source-root-relative path is kept, with the extension swapped to
/// the converter's declared output extension at the file name's first
/// dot. Pass-through converters keep the path unchanged.
pub fn output_rel_path(converter: &Converter, src_dir: &Path, file: &Path) -> PathBuf {
    let rel = file.strip_prefix(src_dir).unwrap_or(file);

    match converter.output_extension() {
        Some(ext) => {
            let name = rel.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            let stem = name.split('.').next().unwrap_or(&name);
            rel.with_file_name(format!("{}{}", stem, ext))
        }
        None => rel.to_path_buf(),
    }
}

/// The absolute output path for a source file.
pub fn output_path(converter: &Converter, src_dir: &Path, dst_dir: &Path, file: &Path) -> PathBuf {
    dst_dir.join(output_rel_path(converter, src_dir, file))
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn is_up_to_date(
    converter: &Converter,
    db: &BuildDatabase,
    src_dir: &Path,
    dst_dir: &Path,
    file: &Path,
) -> bool {
    let dst = output_path(converter, src_dir, dst_dir, file);
    let Some(out_mtime) = mtime(&dst) else {
        return false;
    };

    let key = output_rel_path(converter, src_dir, file).to_string_lossy().into_owned();
    let mut deps = vec![file.to_path_buf()];
    if let Some(record) = db.get(&key) {
        deps.extend(record.dependencies.iter().map(|d| src_dir.join(d)));
    }

    deps.iter().all(|dep| mtime(dep).map(|t| t <= out_mtime).unwrap_or(false))
}

/// Return the subset of `files` that needs (re)conversion.
pub fn filter_stale(
    converter: &Converter,
    files: &[PathBuf],
    db: &BuildDatabase,
    src_dir: &Path,
    dst_dir: &Path,
    reporter: &dyn ProgressReporter,
) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|file| {
            if is_up_to_date(converter, db, src_dir, dst_dir, file) {
                reporter.report(ProgressEvent::Notice {
                    message: format!(
                        "Skip building up-to-date file: {}",
                        file.strip_prefix(src_dir).unwrap_or(file).display()
                    ),
                });
                false
            } else {
                true
            }
        })
        .cloned()
        .collect()
}
