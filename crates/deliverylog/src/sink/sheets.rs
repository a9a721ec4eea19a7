//! Google Sheets sink.
//!
//! Talks to the Sheets v4 `values` API with a pre-issued bearer token.
//! Obtaining and refreshing the token is left to the operator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::RemoteSink;
use crate::error::{Error, Result};

const NAME: &str = "google_sheets";

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 300;

/// A worksheet in a Google spreadsheet.
///
/// The HTTP client is built once and reused for every request.
pub struct GoogleSheetsSink {
    client: Client,
    endpoint: Url,
    spreadsheet_id: String,
    sheet_name: String,
    access_token: String,
}

impl std::fmt::Debug for GoogleSheetsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsSink")
            .field("endpoint", &self.endpoint.as_str())
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheet_name", &self.sheet_name)
            .finish_non_exhaustive()
    }
}

/// The part of a `ValueRange` response we read.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl GoogleSheetsSink {
    /// Create a sink for `sheet_name` in `spreadsheet_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `endpoint` is not a valid base URL or the HTTP
    /// client cannot be built.
    pub fn new(
        endpoint: &str,
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| Error::ConfigValidation {
            message: format!("invalid remote.endpoint {endpoint:?}: {e}"),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::ConfigValidation {
                message: format!("remote.endpoint {endpoint} cannot be a base URL"),
            });
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::remote(NAME, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            access_token: access_token.into(),
        })
    }

    /// URL of the values resource for `range` (in A1 notation, sheet prefix added).
    fn values_url(&self, range_suffix: &str) -> Url {
        let range = format!("{}!{range_suffix}", self.sheet_name);
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                range.as_str(),
            ]);
        }
        url
    }

    /// URL used to read the first row.
    fn first_row_url(&self) -> Url {
        self.values_url("A1:I1")
    }

    /// URL used to append rows below the existing table.
    fn append_url(&self) -> Url {
        let mut url = self.values_url("A1:append");
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        url
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
            body.push_str("...");
        }
        warn!("Sheets API returned {}: {}", status, body);
        Err(Error::remote(NAME, format!("HTTP {status}: {body}")))
    }
}

fn transport(err: &reqwest::Error) -> Error {
    Error::remote(NAME, format!("request failed: {err}"))
}

#[async_trait]
impl RemoteSink for GoogleSheetsSink {
    fn name(&self) -> &'static str {
        NAME
    }

    /// Only row 1 (`A1:I1`) is read. A sheet whose first row is blank
    /// counts as empty even when rows further down hold data, and gets a
    /// header written into the next free row.
    async fn is_empty(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.first_row_url())
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        let range: ValueRange = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::remote(NAME, format!("malformed response: {e}")))?;
        Ok(range.values.is_empty())
    }

    async fn append_row(&self, values: &[String]) -> Result<()> {
        let body = json!({
            "majorDimension": "ROWS",
            "values": [values],
        });
        let response = self
            .client
            .post(self.append_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        Self::check_status(response).await?;
        debug!("Appended row to sheet {}", self.sheet_name);
        Ok(())
    }
}
