//! Result persistence for Skitter
//!
//! Defines the `Sink` interface the engine writes through, plus the three
//! built-in backends: JSON lines, CSV, and SQLite. Every backend serializes
//! its own concurrent writes internally; the engine calls `save` from many
//! workers at once and `close` exactly once when the crawl ends.

mod csv;
mod jsonl;
mod sqlite;

pub use csv::CsvSink;
pub use jsonl::JsonLinesSink;
pub use sqlite::SqliteSink;

use crate::crawler::CrawlResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during sink operations
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Persistence collaborator for crawl results
///
/// Implementations must be safe to call concurrently from multiple workers
/// and must flush all buffered writes before `close` returns.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Persists one crawl result
    async fn save(&self, result: &CrawlResult) -> SinkResult<()>;

    /// Flushes and releases the backend; called exactly once per crawl
    async fn close(&self) -> SinkResult<()>;
}

/// Supported output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[serde(alias = "jsonl")]
    Json,
    Csv,
    Sqlite,
}

impl OutputFormat {
    /// File extension used when the output path has none
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "jsonl",
            Self::Csv => "csv",
            Self::Sqlite => "db",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" | "jsonl" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Opens a sink for the given path and format
///
/// The path gets the format's extension appended when it has none.
pub fn open_sink(path: &Path, format: OutputFormat) -> SinkResult<Arc<dyn Sink>> {
    let mut path = path.to_path_buf();
    if path.extension().is_none() {
        path.set_extension(format.extension());
    }

    Ok(match format {
        OutputFormat::Json => Arc::new(JsonLinesSink::open(&path)?),
        OutputFormat::Csv => Arc::new(CsvSink::open(&path)?),
        OutputFormat::Sqlite => Arc::new(SqliteSink::open(&path)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(
            "sqlite".parse::<OutputFormat>().unwrap(),
            OutputFormat::Sqlite
        );
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_open_sink_appends_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results");
        open_sink(&path, OutputFormat::Json).unwrap();
        assert!(dir.path().join("results.jsonl").exists());
    }
}
