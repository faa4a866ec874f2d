//! SQLite record sink
//!
//! Stores each record as a row of the `records` table. Field values are kept
//! as a JSON object so the table layout does not depend on the parser
//! configuration.

use crate::extract::ExtractedRecord;
use crate::sink::csv_sink::timestamp;
use crate::sink::schema::initialize_schema;
use crate::sink::{RecordSink, SinkError, SinkResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;

/// SQLite record store
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    pub fn open(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| SinkError::Open {
                path: path.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Number of stored records
    pub fn count(&self) -> SinkResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn fields_json(record: &ExtractedRecord) -> SinkResult<String> {
    let object: serde_json::Map<String, serde_json::Value> = record
        .fields
        .iter()
        .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
        .collect();
    Ok(serde_json::to_string(&object)?)
}

#[async_trait]
impl RecordSink for SqliteSink {
    async fn append(&mut self, records: &[ExtractedRecord]) -> SinkResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let scraped_at = timestamp();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (url, fields_json, scraped_at) VALUES (?1, ?2, ?3)",
            )?;
            for record in records {
                stmt.execute(params![record.url, fields_json(record)?, scraped_at])?;
            }
        }
        tx.commit()?;

        tracing::info!("Saved {} records to database", records.len());
        Ok(records.len())
    }

    async fn sync(&mut self) -> SinkResult<()> {
        // Every append commits its own transaction.
        Ok(())
    }
}
