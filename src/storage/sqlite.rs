//! SQLite sink

use crate::crawler::CrawlResult;
use crate::storage::{Sink, SinkError, SinkResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS crawl_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        status_code INTEGER NOT NULL,
        content TEXT NOT NULL,
        headers TEXT NOT NULL,
        metadata TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )
";

/// Stores results in a `crawl_results` table
///
/// rusqlite connections are not Sync, so the connection lives behind a mutex
/// and each save runs its insert inside the lock.
pub struct SqliteSink {
    conn: Mutex<Option<Connection>>,
}

impl SqliteSink {
    /// Opens (or creates) the database and ensures the schema exists
    pub fn open(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn save(&self, result: &CrawlResult) -> SinkResult<()> {
        let headers = serde_json::to_string(&result.headers)?;
        let metadata = serde_json::to_string(&result.metadata)?;

        let guard = self.conn.lock().unwrap();
        let conn = guard.as_ref().ok_or(SinkError::Closed)?;
        conn.execute(
            "INSERT INTO crawl_results (url, status_code, content, headers, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                result.url,
                result.status_code,
                result.content,
                headers,
                metadata,
                result.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn close(&self) -> SinkResult<()> {
        // Dropping the connection flushes and closes the database.
        let mut guard = self.conn.lock().unwrap();
        guard.take();
        Ok(())
    }
}
