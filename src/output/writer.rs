//! Incremental CSV table writer

use super::columns::ColumnMap;
use crate::api::query::result::Row;
use crate::error::Result;
use csv::{QuoteStyle, Writer, WriterBuilder};
use std::fs::{self, File};
use std::path::PathBuf;

struct OpenTable {
    writer: Writer<File>,
    columns: ColumnMap,
}

/// Streams pages of rows into one CSV file.
///
/// Nothing touches the disk until the first non-empty page arrives; that page
/// fixes the column map and header for the rest of the run.
pub struct TableWriter {
    path: PathBuf,
    table: Option<OpenTable>,
    rows_written: u64,
    dropped_values: u64,
}

impl TableWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: None,
            rows_written: 0,
            dropped_values: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Append a page of rows, opening the file and writing the header on first use
    pub fn write_page(&mut self, rows: &[Row]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        if self.table.is_none() {
            let columns = ColumnMap::from_rows(rows);
            if columns.is_empty() {
                log::warn!("Page of {} rows has no data columns, skipping it", rows.len());
                return Ok(());
            }
            self.table = Some(self.open(columns)?);
        }
        let Some(table) = self.table.as_mut() else {
            return Ok(());
        };

        for row in rows {
            self.dropped_values += table.columns.unmapped_keys(row) as u64;
            table.writer.write_record(table.columns.project(row))?;
        }
        self.rows_written += rows.len() as u64;

        Ok(())
    }

    fn open(&self, columns: ColumnMap) -> Result<OpenTable> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_path(&self.path)?;
        writer.write_record(columns.columns())?;

        log::debug!("Opened {} with {} columns", self.path.display(), columns.len());
        Ok(OpenTable { writer, columns })
    }

    /// Flush and close the file, returning the header columns.
    ///
    /// Returns `None` when no rows were ever written; no file exists then.
    pub fn finalize(self) -> Result<Option<Vec<String>>> {
        let Some(mut table) = self.table else {
            return Ok(None);
        };

        table.writer.flush()?;
        if self.dropped_values > 0 {
            log::warn!(
                "{} values were dropped because their columns did not appear in the first page",
                self.dropped_values
            );
        }

        Ok(Some(table.columns.columns()))
    }
}
