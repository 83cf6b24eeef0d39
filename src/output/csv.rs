//! CSV output writer for merged device tables

use crate::exporter::merge::DeviceTable;
use csv::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

use super::{format_utc, OutputError, OutputResult, OutputWriter, TableWriter};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Flush every N rows
const FLUSH_INTERVAL_ROWS: u64 = 10_000;

/// Name of the timestamp index column
pub const TS_COLUMN: &str = "ts";

/// Name of the derived UTC column
pub const UTC_COLUMN: &str = "utc";

/// CSV writer for device tables
///
/// Layout: `ts`, optional `utc`, then one column per key. Rows are written
/// newest first; missing values are empty cells.
pub struct CsvTableWriter {
    writer: Writer<BufWriter<File>>,
    include_utc: bool,
    rows_written: u64,
}

impl CsvTableWriter {
    /// Create a new CSV table writer, creating parent directories as needed
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `include_utc` - Emit the derived `utc` column after `ts`
    pub fn new<P: AsRef<Path>>(path: P, include_utc: bool) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV writer: path={}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {}", e)))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {}", e)))?;

        let buf_writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);

        Ok(Self {
            writer: Writer::from_writer(buf_writer),
            include_utc,
            rows_written: 0,
        })
    }

    /// Get number of data rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn write_header(&mut self, table: &DeviceTable) -> OutputResult<()> {
        let mut header = vec![TS_COLUMN.to_string()];
        if self.include_utc {
            header.push(UTC_COLUMN.to_string());
        }
        header.extend(table.columns().iter().cloned());

        self.writer
            .write_record(&header)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {}", e)))
    }
}

impl TableWriter for CsvTableWriter {
    fn write_table(&mut self, table: &DeviceTable) -> OutputResult<u64> {
        self.write_header(table)?;

        let mut record: Vec<String> = Vec::with_capacity(table.columns().len() + 2);
        for (ts, cells) in table.rows_newest_first() {
            record.clear();
            record.push(ts.to_string());
            if self.include_utc {
                record.push(format_utc(ts)?);
            }
            record.extend(
                cells
                    .iter()
                    .map(|cell| cell.as_ref().map(|v| v.to_string()).unwrap_or_default()),
            );

            self.writer
                .write_record(&record)
                .map_err(|e| OutputError::CsvError(format!("Failed to write row: {}", e)))?;
            self.rows_written += 1;

            if self.rows_written % FLUSH_INTERVAL_ROWS == 0 {
                self.flush()?;
                debug!("Progress: {} rows written", self.rows_written);
            }
        }

        Ok(self.rows_written)
    }
}

impl OutputWriter for CsvTableWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {}", e)))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let buf_writer = self.writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get inner writer: {}", e))
        })?;

        let file = buf_writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get file handle: {}", e))
        })?;

        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {}", e)))?;

        debug!("CSV writer closed: {} rows written", self.rows_written);
        Ok(())
    }
}

/// Write `table` to `path` in one go
pub fn write_table_file(path: &Path, table: &DeviceTable, include_utc: bool) -> OutputResult<u64> {
    let mut writer = CsvTableWriter::new(path, include_utc)?;
    let rows = writer.write_table(table)?;
    writer.close()?;
    Ok(rows)
}
