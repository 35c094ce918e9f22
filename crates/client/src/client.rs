//! Spreadsheet service HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Covers the four
//! calls the sync needs: batch read, range update, sheet listing and
//! batch update for data validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sheetsync_core::{Dimension, GridError};

use crate::auth::{load_credentials, Credentials};

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Spreadsheet API client (blocking).
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::blocking::Client,
    api_base: String,
    creds: Credentials,
}

/// Error type for remote calls.
#[derive(Debug)]
pub enum ClientError {
    /// No API key or access token configured
    NotAuthenticated,
    /// Network error
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// JSON parsing error
    Parse(String),
    /// API base or spreadsheet id does not form a valid URL
    InvalidUrl(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::NotAuthenticated => {
                write!(f, "Not authenticated: set an API key or access token")
            }
            ClientError::Network(msg) => write!(f, "Network error: {}", msg),
            ClientError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            ClientError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ClientError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ClientError> for GridError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::NotAuthenticated => GridError::NotAuthenticated,
            ClientError::Network(msg) => GridError::Network(msg),
            ClientError::Http(code, msg) => GridError::Http(code, msg),
            ClientError::Parse(msg) | ClientError::InvalidUrl(msg) => GridError::Parse(msg),
        }
    }
}

/// One block of a `values:batchGet` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

/// Tab metadata from the spreadsheet resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: i64,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

impl SheetsClient {
    /// Create a client using saved credentials.
    pub fn from_saved_credentials(api_base: &str, timeout: Duration) -> Result<Self, ClientError> {
        let creds = load_credentials().ok_or(ClientError::NotAuthenticated)?;
        Self::new(creds, api_base, timeout)
    }

    pub fn new(creds: Credentials, api_base: &str, timeout: Duration) -> Result<Self, ClientError> {
        if creds.is_empty() {
            return Err(ClientError::NotAuthenticated);
        }
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("ssync/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            creds,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Read several ranges in one request. Cells come back unformatted, so
    /// numbers and booleans keep their JSON types.
    pub fn batch_get(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
        dimension: Dimension,
    ) -> Result<Vec<ValueRange>, ClientError> {
        if ranges.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint(&["v4", "spreadsheets", spreadsheet_id, "values:batchGet"])?;

        let mut query: Vec<(&str, &str)> = ranges.iter().map(|r| ("ranges", r.as_str())).collect();
        query.push(("majorDimension", dimension.as_str()));
        query.push(("valueRenderOption", "UNFORMATTED_VALUE"));

        let request = self.http.get(url).query(&query);
        let parsed: BatchGetResponse = self.send(request)?
            .json()
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let mut blocks = parsed.value_ranges;
        // Blocks past the last populated one may be omitted
        blocks.resize_with(ranges.len().max(blocks.len()), ValueRange::default);
        Ok(blocks)
    }

    /// Overwrite `range` with `values`. Cells are stored as raw text, so the
    /// service never turns `"007"` into a number or `"=A1"` into a formula.
    pub fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        dimension: Dimension,
        values: Vec<Vec<String>>,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&["v4", "spreadsheets", spreadsheet_id, "values", range])?;
        let body = serde_json::json!({
            "range": range,
            "majorDimension": dimension.as_str(),
            "values": values,
        });

        let request = self
            .http
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        self.send(request)?;
        Ok(())
    }

    /// Every tab of the spreadsheet, in spreadsheet order.
    pub fn sheet_properties(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>, ClientError> {
        let url = self.endpoint(&["v4", "spreadsheets", spreadsheet_id])?;
        let request = self.http.get(url).query(&[("fields", "sheets.properties")]);
        let parsed: SpreadsheetResponse = self.send(request)?
            .json()
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(parsed.sheets.into_iter().map(|s| s.properties).collect())
    }

    pub fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, ClientError> {
        let segment = format!("{spreadsheet_id}:batchUpdate");
        let url = self.endpoint(&["v4", "spreadsheets", &segment])?;
        let request = self
            .http
            .post(url)
            .json(&serde_json::json!({ "requests": requests }));
        self.send(request)?
            .json()
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.api_base.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, ClientError> {
        let request = match (&self.creds.access_token, &self.creds.api_key) {
            (Some(token), _) if !token.trim().is_empty() => request.bearer_auth(token),
            (_, Some(key)) if !key.trim().is_empty() => request.query(&[("key", key)]),
            _ => return Err(ClientError::NotAuthenticated),
        };

        let response = request
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            log::debug!("remote call failed with {status}: {body}");
            return Err(ClientError::Http(status, body));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_credentials_rejected() {
        let err = SheetsClient::new(Credentials::default(), DEFAULT_API_BASE, Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::NotAuthenticated));
    }

    #[test]
    fn test_endpoint_encodes_range_segment() {
        let client = SheetsClient::new(
            Credentials::with_api_key("k"),
            "http://localhost:9/",
            Duration::from_secs(5),
        )
        .unwrap();
        let url = client
            .endpoint(&["v4", "spreadsheets", "abc", "values", "'My Sheet'!A1:B2"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9/v4/spreadsheets/abc/values/'My%20Sheet'!A1:B2"
        );
    }

    #[test]
    fn test_client_error_maps_to_grid_error() {
        let err: GridError = ClientError::Http(503, "busy".into()).into();
        assert!(err.is_transport());
        let err: GridError = ClientError::Http(404, "gone".into()).into();
        assert!(!err.is_transport());
        let err: GridError = ClientError::NotAuthenticated.into();
        assert!(matches!(err, GridError::NotAuthenticated));
    }
}
