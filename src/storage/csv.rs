//! CSV table files.
//!
//! Each table becomes `<out_dir>/<table>.csv` with a header row taken from the
//! record's field names. Writing a table replaces the whole file.

use std::fs;

use serde::Serialize;
use tracing::{debug, info};

use super::{RecordSink, StorageConfig, StorageError};

/// Writes tables as CSV files under the output directory.
pub struct CsvSink {
    config: StorageConfig,
}

impl CsvSink {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

impl RecordSink for CsvSink {
    fn write_records<T: Serialize>(
        &mut self,
        table: &str,
        records: &[T],
    ) -> Result<usize, StorageError> {
        let path = self.config.table_path(table)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = ::csv::Writer::from_path(&path)?;
        let mut count = 0;

        for record in records {
            writer.serialize(record)?;
            count += 1;
        }

        writer.flush()?;
        debug!("Wrote {:?}", path);
        info!("{}: {} rows", table, count);

        Ok(count)
    }
}
