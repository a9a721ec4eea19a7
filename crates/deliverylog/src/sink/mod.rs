//! Remote sinks that mirror recorded deliveries.
//!
//! A sink is an append-only, spreadsheet-like store. The recorder only needs
//! two things from it: whether it is still empty (to decide on writing the
//! header row) and appending one row of text values.
//!
//! - [`GoogleSheetsSink`]: a worksheet reached through the Sheets v4 API.
//! - [`CsvFileSink`]: a local CSV file standing in for a spreadsheet.
//! - [`MemorySink`]: rows kept in memory, with failure injection for tests.

mod csv_file;
mod memory;
mod sheets;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Config, SinkKind};
use crate::error::{Error, Result};
use crate::record::COLUMNS;

pub use csv_file::CsvFileSink;
pub use memory::MemorySink;
pub use sheets::GoogleSheetsSink;

/// An external append-only row store.
///
/// Implementations are built once per process and shared by reference.
#[async_trait]
pub trait RemoteSink: Send + Sync + std::fmt::Debug {
    /// The name of this sink (for logging and error messages).
    fn name(&self) -> &'static str;

    /// Whether the sink holds no rows at all.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteSink`] if the sink cannot be reached.
    async fn is_empty(&self) -> Result<bool>;

    /// Append one row of values after the last existing row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteSink`] if the row could not be appended.
    async fn append_row(&self, values: &[String]) -> Result<()>;
}

#[async_trait]
impl<T: RemoteSink + ?Sized> RemoteSink for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn is_empty(&self) -> Result<bool> {
        (**self).is_empty().await
    }

    async fn append_row(&self, values: &[String]) -> Result<()> {
        (**self).append_row(values).await
    }
}

/// Write the header row if the sink is empty.
///
/// Returns `true` if the header was written by this call.
///
/// # Errors
///
/// Propagates sink failures.
pub async fn ensure_header(sink: &dyn RemoteSink) -> Result<bool> {
    if !sink.is_empty().await? {
        return Ok(false);
    }
    let header: Vec<String> = COLUMNS.iter().map(ToString::to_string).collect();
    sink.append_row(&header).await?;
    info!("Wrote header row to {} sink", sink.name());
    Ok(true)
}

/// Build the sink selected in configuration, or `None` when mirroring is off.
///
/// # Errors
///
/// Returns an error if the sink's settings are incomplete or its client
/// cannot be constructed.
pub fn from_config(config: &Config) -> Result<Option<Box<dyn RemoteSink>>> {
    let remote = &config.remote;
    let sink: Box<dyn RemoteSink> = match remote.kind {
        SinkKind::None => return Ok(None),
        SinkKind::GoogleSheets => {
            let spreadsheet_id = remote.spreadsheet_id.clone().ok_or_else(|| {
                Error::ConfigValidation {
                    message: "remote.spreadsheet_id is required for google_sheets".to_string(),
                }
            })?;
            let token = remote.access_token.clone().ok_or_else(|| Error::ConfigValidation {
                message: "remote.access_token is required for google_sheets".to_string(),
            })?;
            Box::new(GoogleSheetsSink::new(
                &remote.endpoint,
                spreadsheet_id,
                remote.sheet_name.clone(),
                token,
                config.remote_timeout(),
            )?)
        }
        SinkKind::CsvFile => {
            let path = remote.csv_path.clone().ok_or_else(|| Error::ConfigValidation {
                message: "remote.csv_path is required for csv_file".to_string(),
            })?;
            Box::new(CsvFileSink::new(path))
        }
    };
    info!("Remote sink: {}", sink.name());
    Ok(Some(sink))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[tokio::test]
    async fn test_ensure_header_on_empty_sink() {
        let sink = MemorySink::new();
        assert!(ensure_header(&sink).await.unwrap());
        assert_eq!(sink.rows(), vec![COLUMNS.map(String::from).to_vec()]);
    }

    #[tokio::test]
    async fn test_ensure_header_skips_non_empty_sink() {
        let sink = MemorySink::new();
        sink.append_row(&["existing".to_string()]).await.unwrap();

        assert!(!ensure_header(&sink).await.unwrap());
        assert_eq!(sink.row_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_header_propagates_failure() {
        let sink = MemorySink::new();
        sink.fail_with("offline");

        let err = ensure_header(&sink).await.unwrap_err();
        assert!(err.is_remote_error());
    }

    #[test]
    fn test_from_config_none() {
        let config = Config::default();
        assert!(from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_csv_file() {
        let mut config = Config::default();
        config.remote.kind = SinkKind::CsvFile;
        config.remote.csv_path = Some(PathBuf::from("mirror.csv"));

        let sink = from_config(&config).unwrap().unwrap();
        assert_eq!(sink.name(), "csv_file");
    }

    #[test]
    fn test_from_config_csv_file_missing_path() {
        let mut config = Config::default();
        config.remote.kind = SinkKind::CsvFile;
        assert!(from_config(&config).is_err());
    }

    #[test]
    fn test_from_config_google_sheets() {
        let mut config = Config::default();
        config.remote.kind = SinkKind::GoogleSheets;
        config.remote.spreadsheet_id = Some("sheet-id".to_string());
        config.remote.access_token = Some("token".to_string());

        let sink = from_config(&config).unwrap().unwrap();
        assert_eq!(sink.name(), "google_sheets");
    }
}
