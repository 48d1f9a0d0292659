use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{Authenticator, check};
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Reads and writes cell values of a single spreadsheet
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    auth: Arc<Authenticator>,
    base_url: String,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub fn new(
        http: reqwest::Client,
        auth: Arc<Authenticator>,
        base_url: &str,
        spreadsheet_id: &str,
    ) -> Self {
        SheetsClient {
            http,
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    /// Formatted values of `range`, row by row; an empty sheet yields no rows
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let token = self.auth.access_token().await?;
        let response = self
            .http
            .get(self.values_url(range))
            .bearer_auth(token)
            .send()
            .await?;

        let body: ValueRange = check(response).await?.json().await?;
        Ok(body.values)
    }

    /// Write `value` into the single cell `range`, stored as typed (`RAW`)
    pub async fn update_cell(&self, range: &str, value: &str) -> Result<()> {
        let token = self.auth.access_token().await?;
        let response = self
            .http
            .put(self.values_url(range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&json!({ "values": [[value]] }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}
