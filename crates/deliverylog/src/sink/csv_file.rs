//! CSV file sink.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::RemoteSink;
use crate::error::{Error, Result};

const NAME: &str = "csv_file";

/// A local CSV file used as an append-only spreadsheet.
///
/// The file counts as empty when it does not exist or has zero length.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    /// Create a sink appending to `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fail(&self, err: impl std::fmt::Display) -> Error {
        Error::remote(NAME, format!("{}: {err}", self.path.display()))
    }
}

#[async_trait]
impl RemoteSink for CsvFileSink {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn is_empty(&self) -> Result<bool> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn append_row(&self, values: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.fail(e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.fail(e))?;

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(file);
        writer.write_record(values).map_err(|e| self.fail(e))?;
        writer.flush().map_err(|e| self.fail(e))?;
        debug!("Appended row to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvFileSink::new(dir.path().join("mirror.csv"));
        assert!(sink.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_append_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mirror.csv");
        let sink = CsvFileSink::new(&path);

        sink.append_row(&row(&["date", "worker_name"])).await.unwrap();
        sink.append_row(&row(&["2024-03-01", "Ana, Jr."])).await.unwrap();
        assert!(!sink.is_empty().await.unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "date,worker_name\n2024-03-01,\"Ana, Jr.\"\n");
    }

    #[tokio::test]
    async fn test_unwritable_path_is_remote_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let sink = CsvFileSink::new(dir.path());
        let err = sink.append_row(&row(&["x"])).await.unwrap_err();
        assert!(err.is_remote_error());
    }
}
