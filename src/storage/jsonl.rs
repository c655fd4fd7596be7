//! JSON lines sink - one serialized result per line

use crate::crawler::CrawlResult;
use crate::storage::{Sink, SinkError, SinkResult};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Appends results to a `.jsonl` file
pub struct JsonLinesSink {
    // Option is the closed marker; writes after close error out.
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonLinesSink {
    /// Opens (or creates) the output file in append mode
    pub fn open(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }
}

#[async_trait]
impl Sink for JsonLinesSink {
    async fn save(&self, result: &CrawlResult) -> SinkResult<()> {
        let line = serde_json::to_string(result)?;
        let mut guard = self.writer.lock().unwrap();
        let writer = guard.as_mut().ok_or(SinkError::Closed)?;
        writeln!(writer, "{}", line)?;
        Ok(())
    }

    async fn close(&self) -> SinkResult<()> {
        let mut guard = self.writer.lock().unwrap();
        if let Some(mut writer) = guard.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchMetadata;
    use chrono::Utc;
    use std::collections::HashMap;

    fn sample_result(url: &str) -> CrawlResult {
        CrawlResult {
            url: url.to_string(),
            status_code: 200,
            content: "<html></html>".to_string(),
            headers: HashMap::new(),
            metadata: FetchMetadata {
                elapsed_ms: 12,
                proxy: None,
                attempt: 1,
            },
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_writes_one_line_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let sink = JsonLinesSink::open(&path).unwrap();
        sink.save(&sample_result("http://a/")).await.unwrap();
        sink.save(&sample_result("http://b/")).await.unwrap();
        sink.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["url"], "http://a/");
        assert_eq!(first["status_code"], 200);
    }

    #[tokio::test]
    async fn test_save_after_close_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::open(&dir.path().join("out.jsonl")).unwrap();

        sink.close().await.unwrap();
        let err = sink.save(&sample_result("http://a/")).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::open(&dir.path().join("out.jsonl")).unwrap();

        sink.close().await.unwrap();
        sink.close().await.unwrap();
    }
}
