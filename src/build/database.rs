//! Persisted build database.
//!
//! The database remembers, for every output the previous builds produced,
//! which input it came from and which extra files it depends on. It seeds
//! the up-to-date check of the next build.
//!
//! # File Format
//!
//! A JSON array of records at the project root:
//!
//! ```json
//! [
//!   {
//!     "input_file": "models/tree.blend",
//!     "output_file": "models/tree.bam",
//!     "dependencies": ["textures/bark.png"]
//!   }
//! ]
//! ```
//!
//! Paths are relative: inputs and dependencies to the asset root, outputs
//! to the export root. A missing or unparseable file is treated as an
//! empty database, never as an error; stale records for removed sources
//! simply go unused.

use crate::converter::ConversionRecord;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Default database filename, stored at the project root.
pub const DATABASE_FILENAME: &str = ".bakery-builddb";

/// Mapping from output file (relative to the export root) to the record
/// of its last successful conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildDatabase {
    records: BTreeMap<String, ConversionRecord>,
}

impl BuildDatabase {
    /// Create a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a database from a file.
    ///
    /// Missing or malformed content yields an empty database.
    pub fn load(path: &Path) -> Self {
        let records: Vec<ConversionRecord> = File::open(path)
            .ok()
            .and_then(|file| serde_json::from_reader(BufReader::new(file)).ok())
            .unwrap_or_default();

        let mut db = Self::new();
        for record in records {
            db.insert(record);
        }
        db
    }

    /// Save the database to a file.
    ///
    /// Called only after a clean build; a failed or interrupted run must
    /// leave the previous file untouched. Writes go to a sibling temp file
    /// renamed into place, so a crash mid-save cannot corrupt the old file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        let records: Vec<&ConversionRecord> = self.records.values().collect();
        serde_json::to_writer(&mut writer, &records)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        writer.flush()?;
        fs::rename(&tmp, path)
    }

    /// Insert a record, replacing any earlier record for the same output.
    pub fn insert(&mut self, record: ConversionRecord) {
        self.records.insert(record.output_file.clone(), record);
    }

    /// Look up the record for an output file.
    pub fn get(&self, output_file: &str) -> Option<&ConversionRecord> {
        self.records.get(output_file)
    }

    /// Merge a batch of conversion results; later records win per output.
    pub fn merge(&mut self, records: impl IntoIterator<Item = ConversionRecord>) {
        for record in records {
            self.insert(record);
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the database holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in output-path order.
    pub fn records(&self) -> impl Iterator<Item = &ConversionRecord> {
        self.records.values()
    }
}
