//! Thin clients for the two Google APIs the workflow talks to.
//!
//! Both clients share one `reqwest::Client` and one [`Authenticator`]; every
//! request carries a bearer token and any non-2xx answer is turned into
//! `Error::Api` with the response body kept for the logs.

pub mod credentials;
pub mod drive;
pub mod sheets;

pub use credentials::Authenticator;
pub use drive::{DriveClient, UploadedFile};
pub use sheets::SheetsClient;

use crate::error::{Error, Result};

/// Pass successful responses through, turn the rest into `Error::Api`
pub(crate) async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}
