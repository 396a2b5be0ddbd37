//! Output table storage.
//!
//! The export hands every table to a [`RecordSink`] as an ordered slice of
//! flat records. The default sink writes one CSV file per table.

pub mod csv;

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub use self::csv::CsvSink;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),
}

/// Configuration for output paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub out_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    /// Path of the CSV file for a table.
    pub fn table_path(&self, table: &str) -> Result<PathBuf, StorageError> {
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidTable(table.to_string()));
        }
        Ok(self.out_dir.join(format!("{}.csv", table)))
    }

    /// Create the output directory, optionally removing it first.
    pub fn prepare(&self, clean: bool) -> Result<(), StorageError> {
        if clean && self.out_dir.exists() {
            fs::remove_dir_all(&self.out_dir)?;
            info!("Removed previous output in {:?}", self.out_dir);
        }
        fs::create_dir_all(&self.out_dir)?;
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./out"))
    }
}

/// Destination for output tables.
pub trait RecordSink {
    /// Persist `records` as table `table`, replacing any previous content.
    fn write_records<T: Serialize>(&mut self, table: &str, records: &[T])
        -> Result<usize, StorageError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;

    use serde_json::Value;

    use super::*;

    /// Sink keeping every table in memory as JSON rows.
    #[derive(Debug, Default)]
    pub struct MemorySink {
        pub tables: BTreeMap<String, Vec<Value>>,
    }

    impl MemorySink {
        pub fn rows(&self, table: &str) -> &[Value] {
            self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
        }
    }

    impl RecordSink for MemorySink {
        fn write_records<T: Serialize>(
            &mut self,
            table: &str,
            records: &[T],
        ) -> Result<usize, StorageError> {
            let rows = records
                .iter()
                .map(|r| serde_json::to_value(r).unwrap())
                .collect();
            self.tables.insert(table.to_string(), rows);
            Ok(records.len())
        }
    }
}
