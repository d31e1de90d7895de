use super::models::IndexRecord;
use super::sqlite::Database;
use chrono::{DateTime, Utc};
use rusqlite::{params, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

impl Database {
    /// Load every known content hash with its destination path, for O(1)
    /// in-memory duplicate lookups. Queried once at startup.
    pub fn load_hash_index(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT hash, dest_path FROM archived_file")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut index = HashMap::new();
        for row in rows {
            let (hash, dest_path) = row?;
            index.insert(hash, dest_path);
        }
        debug!("Loaded {} existing hashes into memory", index.len());
        Ok(index)
    }

    /// Most recent `inserted_at`, used as the incremental watermark.
    /// Returns `None` when the archive is empty or the stored value does not
    /// parse (same effect: no watermark, nothing gets skipped).
    pub fn last_inserted_at(&self) -> Result<Option<DateTime<Utc>>> {
        let last: Option<String> = self.connection().query_row(
            "SELECT MAX(inserted_at) FROM archived_file",
            [],
            |row| row.get(0),
        )?;

        Ok(last
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    /// Commit a drained batch in one transaction with insert-or-ignore
    /// semantics on the unique hash. A failed individual insert is logged and
    /// skipped — the in-memory reservation already protects correctness.
    /// Returns the number of rows actually inserted.
    pub fn insert_records(&self, records: &[IndexRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.connection().unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO archived_file \
                 (src_path, dest_path, hash, size, mtime, inserted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                match stmt.execute(params![
                    record.src_path,
                    record.dest_path,
                    record.hash,
                    record.size,
                    record.mtime,
                    record.inserted_at,
                ]) {
                    Ok(n) => inserted += n,
                    Err(e) => warn!("Skipping index row for {}: {}", record.src_path, e),
                }
            }
        }
        tx.commit()?;
        debug!("Batch inserted {} of {} records", inserted, records.len());
        Ok(inserted)
    }

    pub fn archived_count(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM archived_file", [], |row| row.get(0))
    }
}
