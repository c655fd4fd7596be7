//! CSV sink - flat summary rows, not full page bodies
//!
//! Page content does not survive CSV quoting at useful fidelity, so this
//! backend records the content length instead of the content itself.

use crate::crawler::CrawlResult;
use crate::storage::{Sink, SinkError, SinkResult};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

const HEADER: &str = "url,status_code,content_length,timestamp";

/// Appends one summary row per result to a `.csv` file
pub struct CsvSink {
    writer: Mutex<Option<BufWriter<File>>>,
}

impl CsvSink {
    /// Opens (or creates) the output file, writing the header for new files
    pub fn open(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let is_new = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        if is_new {
            writeln!(writer, "{}", HEADER)?;
        }
        Ok(Self {
            writer: Mutex::new(Some(writer)),
        })
    }
}

/// Quotes a field when it contains a comma, quote, or newline
fn escape(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[async_trait]
impl Sink for CsvSink {
    async fn save(&self, result: &CrawlResult) -> SinkResult<()> {
        let row = format!(
            "{},{},{},{}",
            escape(&result.url),
            result.status_code,
            result.content.len(),
            result.timestamp.to_rfc3339()
        );
        let mut guard = self.writer.lock().unwrap();
        let writer = guard.as_mut().ok_or(SinkError::Closed)?;
        writeln!(writer, "{}", row)?;
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
            content: "abcde".to_string(),
            headers: HashMap::new(),
            metadata: FetchMetadata {
                elapsed_ms: 5,
                proxy: None,
                attempt: 1,
            },
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let sink = CsvSink::open(&path).unwrap();
        sink.save(&sample_result("http://a/")).await.unwrap();
        sink.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("http://a/,200,5,"));
    }

    #[tokio::test]
    async fn test_reopen_does_not_duplicate_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let sink = CsvSink::open(&path).unwrap();
        sink.save(&sample_result("http://a/")).await.unwrap();
        sink.close().await.unwrap();

        let sink = CsvSink::open(&path).unwrap();
        sink.save(&sample_result("http://b/")).await.unwrap();
        sink.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(HEADER).count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_escape_quotes_commas() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
