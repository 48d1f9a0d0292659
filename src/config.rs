use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::roster::column_index;

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_ROSTER_RANGE: &str = "A1:H";
const DEFAULT_SESSION_HOURS: u64 = 24;

/// Where the roster keeps each piece of employee data
///
/// Column indices are 0-based, so `4` is column `E`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RosterLayout {
    /// Column holding the employee name, matched at login and when recording
    pub name_column: usize,

    /// Column holding the link to the unsigned payslip
    pub document_column: usize,

    /// Column that receives the link to the signed payslip
    pub signed_column: usize,

    /// Column holding the employee password
    pub password_column: usize,

    /// Optional column with the employee e-mail; the signed file is shared with it
    pub email_column: Option<usize>,
}

impl Default for RosterLayout {
    fn default() -> Self {
        RosterLayout {
            name_column: 0,
            document_column: 4,
            signed_column: 6,
            password_column: 7,
            email_column: None,
        }
    }
}

/// Base URLs of the Google APIs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub sheets: String,
    pub drive: String,
    pub drive_upload: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            sheets: "https://sheets.googleapis.com/v4".to_string(),
            drive: "https://www.googleapis.com/drive/v3".to_string(),
            drive_upload: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }
}

/// How the service authenticates against Google
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    /// Content of a service-account key file
    ServiceAccountJson(String),

    /// A bearer token minted elsewhere
    AccessToken(String),
}

/// Runtime configuration of the signing service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub spreadsheet_id: String,
    pub roster_range: String,
    pub signed_folder_id: String,
    pub session_hours: u64,
    pub static_dir: String,
    pub credentials_file: Option<String>,
    pub layout: RosterLayout,
    pub endpoints: Endpoints,
    #[serde(skip)]
    pub credentials: Option<CredentialSource>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: DEFAULT_BIND.to_string(),
            spreadsheet_id: String::new(),
            roster_range: DEFAULT_ROSTER_RANGE.to_string(),
            signed_folder_id: String::new(),
            session_hours: DEFAULT_SESSION_HOURS,
            static_dir: "static".to_string(),
            credentials_file: None,
            layout: RosterLayout::default(),
            endpoints: Endpoints::default(),
            credentials: None,
        }
    }
}

impl Config {
    /// Load the configuration from the process environment
    ///
    /// `PAYSLIP_CONFIG` may name a JSON file providing the base values; any
    /// `PAYSLIP_*` / `GOOGLE_*` variable overrides the file.
    ///
    /// # Errors
    /// * `Error::Config` when a required value is missing or malformed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("PAYSLIP_CONFIG") {
            Some(path) => {
                let contents = fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("cannot read {}: {}", path, e)))?;
                serde_json::from_str(&contents)
                    .map_err(|e| Error::Config(format!("cannot parse {}: {}", path, e)))?
            }
            None => Config::default(),
        };

        if let Some(bind) = lookup("PAYSLIP_BIND") {
            config.bind = bind;
        }
        if let Some(id) = lookup("PAYSLIP_SPREADSHEET_ID") {
            config.spreadsheet_id = id;
        }
        if let Some(range) = lookup("PAYSLIP_ROSTER_RANGE") {
            config.roster_range = range;
        }
        if let Some(folder) = lookup("PAYSLIP_SIGNED_FOLDER_ID") {
            config.signed_folder_id = folder;
        }
        if let Some(dir) = lookup("PAYSLIP_STATIC_DIR") {
            config.static_dir = dir;
        }
        if let Some(hours) = lookup("PAYSLIP_SESSION_HOURS") {
            config.session_hours = hours.trim().parse().map_err(|_| {
                Error::Config(format!("PAYSLIP_SESSION_HOURS is not a number: {:?}", hours))
            })?;
        }
        if let Some(letter) = lookup("PAYSLIP_SHARE_COLUMN") {
            let index = column_index(&letter).ok_or_else(|| {
                Error::Config(format!("PAYSLIP_SHARE_COLUMN is not a column: {:?}", letter))
            })?;
            config.layout.email_column = Some(index);
        }

        // Inline key wins over a key file, a raw token is the last resort
        if let Some(json) = lookup("GOOGLE_CREDENTIALS") {
            config.credentials = Some(CredentialSource::ServiceAccountJson(json));
        } else if let Some(path) =
            lookup("GOOGLE_CREDENTIALS_FILE").or_else(|| config.credentials_file.clone())
        {
            let json = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("cannot read credentials {}: {}", path, e)))?;
            config.credentials = Some(CredentialSource::ServiceAccountJson(json));
        } else if let Some(token) = lookup("GOOGLE_ACCESS_TOKEN") {
            config.credentials = Some(CredentialSource::AccessToken(token));
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(Error::Config("PAYSLIP_SPREADSHEET_ID is required".to_string()));
        }
        if self.signed_folder_id.trim().is_empty() {
            return Err(Error::Config("PAYSLIP_SIGNED_FOLDER_ID is required".to_string()));
        }
        if self.credentials.is_none() {
            return Err(Error::Config(
                "one of GOOGLE_CREDENTIALS, GOOGLE_CREDENTIALS_FILE or GOOGLE_ACCESS_TOKEN \
                 is required"
                    .to_string(),
            ));
        }
        if self.session_hours == 0 {
            return Err(Error::Config("PAYSLIP_SESSION_HOURS must be positive".to_string()));
        }
        Ok(())
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_hours * 60 * 60)
    }
}
