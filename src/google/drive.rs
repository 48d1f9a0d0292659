use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::{Authenticator, check};
use crate::error::Result;

/// A file created on Drive
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(rename = "webViewLink", default)]
    pub web_view_link: Option<String>,
}

impl UploadedFile {
    /// The browser link, built from the id when Drive did not return one
    pub fn link(&self) -> String {
        self.web_view_link
            .clone()
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", self.id))
    }
}

#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    auth: Arc<Authenticator>,
    base_url: String,
    upload_url: String,
}

impl DriveClient {
    pub fn new(
        http: reqwest::Client,
        auth: Arc<Authenticator>,
        base_url: &str,
        upload_url: &str,
    ) -> Self {
        DriveClient {
            http,
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
            upload_url: upload_url.trim_end_matches('/').to_string(),
        }
    }

    /// Full content of `file_id`
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let token = self.auth.access_token().await?;
        let response = self
            .http
            .get(format!("{}/files/{}", self.base_url, urlencoding::encode(file_id)))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .bearer_auth(token)
            .send()
            .await?;

        let bytes = check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Create `name` inside `folder_id` with a PDF body in one multipart request
    pub async fn upload_pdf(
        &self,
        name: &str,
        folder_id: &str,
        pdf: Vec<u8>,
    ) -> Result<UploadedFile> {
        let token = self.auth.access_token().await?;
        let boundary = format!("payslip-{}", Uuid::new_v4().simple());
        let metadata = json!({ "name": name, "parents": [folder_id] });
        let body = multipart_related(&boundary, &metadata.to_string(), "application/pdf", &pdf);

        let response = self
            .http
            .post(format!("{}/files", self.upload_url))
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .bearer_auth(token)
            .header(CONTENT_TYPE, format!("multipart/related; boundary={}", boundary))
            .body(body)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// Grant `email` read access without sending Google's notification mail
    pub async fn share_with_reader(&self, file_id: &str, email: &str) -> Result<()> {
        let token = self.auth.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/files/{}/permissions",
                self.base_url,
                urlencoding::encode(file_id)
            ))
            .query(&[("sendNotificationEmail", "false"), ("supportsAllDrives", "true")])
            .bearer_auth(token)
            .json(&json!({ "type": "user", "role": "reader", "emailAddress": email }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}

/// Body of a `multipart/related` upload: JSON metadata part, then the media part
fn multipart_related(boundary: &str, metadata: &str, mime: &str, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + metadata.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
