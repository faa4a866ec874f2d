//! CSV record sink

use crate::extract::ExtractedRecord;
use crate::sink::{RecordSink, SinkError, SinkResult, SCRAPED_AT_COLUMN};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Appends records to a CSV file
///
/// The header row is written only when the file is new or empty, so
/// reopening the same file never duplicates it.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    has_header: bool,
}

impl CsvSink {
    /// Opens `path` for appending, creating it and its directory if needed
    pub fn open(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source: std::io::Error| SinkError::Open {
            path: path.display().to_string(),
            source,
        };

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(open_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_err)?;
        let has_header = file.metadata().map_err(open_err)?.len() > 0;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        Ok(Self {
            path,
            writer,
            has_header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn append(&mut self, records: &[ExtractedRecord]) -> SinkResult<usize> {
        let Some(first) = records.first() else {
            return Ok(0);
        };

        if !self.has_header {
            self.writer.write_record(header_for(first))?;
            self.has_header = true;
        }

        let scraped_at = timestamp();
        for record in records {
            self.writer.write_record(row_for(record, &scraped_at))?;
        }
        self.writer.flush()?;

        tracing::info!("Saved {} records to {}", records.len(), self.path.display());
        Ok(records.len())
    }

    async fn sync(&mut self) -> SinkResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Encodes records as CSV text, optionally preceded by the header row
pub fn encode_rows(
    records: &[ExtractedRecord],
    with_header: bool,
    scraped_at: &str,
) -> SinkResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    if with_header {
        if let Some(first) = records.first() {
            writer.write_record(header_for(first))?;
        }
    }
    for record in records {
        writer.write_record(row_for(record, scraped_at))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SinkError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| SinkError::Remote(format!("non-UTF-8 CSV output: {}", e)))
}

/// Current time as stored in the `scraped_at` column
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn header_for(record: &ExtractedRecord) -> Vec<&str> {
    let mut header = record.column_names();
    header.push(SCRAPED_AT_COLUMN);
    header
}

fn row_for<'a>(record: &'a ExtractedRecord, scraped_at: &'a str) -> Vec<&'a str> {
    let mut row = record.column_values();
    row.push(scraped_at);
    row
}
