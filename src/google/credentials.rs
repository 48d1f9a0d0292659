use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::CredentialSource;
use crate::error::{Error, Result};

/// OAuth scopes needed to read the roster, write links and move files
pub const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Refresh a cached token this long before Google would reject it
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service-account key file that the token exchange needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Credentials(format!("invalid service account key: {}", e)))
    }
}

/// JWT claims of the `jwt-bearer` grant
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_key(key: &ServiceAccountKey, issued_at: i64) -> Self {
        Claims {
            iss: key.client_email.clone(),
            scope: SCOPES.to_string(),
            aud: key.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug)]
enum TokenSource {
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Mutex<Option<CachedToken>>,
    },
    Static(String),
}

/// Hands out bearer tokens for the Google APIs
#[derive(Debug)]
pub struct Authenticator {
    source: TokenSource,
    http: reqwest::Client,
}

impl Authenticator {
    pub fn new(source: &CredentialSource, http: reqwest::Client) -> Result<Self> {
        let source = match source {
            CredentialSource::ServiceAccountJson(json) => TokenSource::ServiceAccount {
                key: ServiceAccountKey::from_json(json)?,
                cached: Mutex::new(None),
            },
            CredentialSource::AccessToken(token) => TokenSource::Static(token.trim().to_string()),
        };
        Ok(Authenticator { source, http })
    }

    /// A token usable right now, minting a new one when the cache is stale
    pub async fn access_token(&self) -> Result<String> {
        match &self.source {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount { key, cached } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.value.clone());
                    }
                }

                let fresh = self.exchange(key).await?;
                let value = fresh.value.clone();
                *cached = Some(fresh);
                Ok(value)
            }
        }
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<CachedToken> {
        let assertion = sign_assertion(key, Utc::now().timestamp())?;

        let response = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Credentials(format!(
                "token exchange failed with {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await?;
        log::debug!("minted access token for {}", key.client_email);

        let lifetime = Duration::from_secs(token.expires_in);
        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }
}

/// Build and sign the RS256 assertion sent to `token_uri`
pub fn sign_assertion(key: &ServiceAccountKey, issued_at: i64) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    let claims = Claims::for_key(key, issued_at);
    Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_JSON: &str = r#"{
        "type": "service_account",
        "client_email": "signer@example.iam.gserviceaccount.com",
        "private_key": "not a pem",
        "private_key_id": "k1"
    }"#;

    #[test]
    fn key_file_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(key.private_key_id.as_deref(), Some("k1"));
    }

    #[test]
    fn claims_cover_one_hour() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        let claims = Claims::for_key(&key, 1_000);
        assert_eq!(claims.iss, "signer@example.iam.gserviceaccount.com");
        assert_eq!(claims.aud, DEFAULT_TOKEN_URI);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(claims.scope.contains("spreadsheets"));
        assert!(claims.scope.contains("drive"));
    }

    #[test]
    fn malformed_key_is_a_credentials_error() {
        let err = ServiceAccountKey::from_json("{}").unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn bad_pem_cannot_sign() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        assert!(matches!(sign_assertion(&key, 0), Err(Error::Jwt(_))));
    }

    #[tokio::test]
    async fn static_token_is_returned_trimmed() {
        let auth = Authenticator::new(
            &CredentialSource::AccessToken(" ya29.token \n".to_string()),
            reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(auth.access_token().await.unwrap(), "ya29.token");
    }
}
