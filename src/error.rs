use thiserror::Error;

/// Everything that can go wrong between the login form and the signed file.
#[derive(Debug, Error)]
pub enum Error {
    /// A required setting is missing or malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// The Google credentials could not be parsed or exchanged for a token
    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A Google API answered with a non-success status
    #[error("google api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The PDF parsed but lacks something the stamp needs (e.g. a first page)
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("employee {0:?} not found in roster")]
    EmployeeNotFound(String),

    #[error("cannot extract a file id from document link {0:?}")]
    InvalidDocumentLink(String),

    /// Nothing was drawn on the canvas
    #[error("signature is empty")]
    EmptySignature,

    #[error("invalid signature image: {0}")]
    InvalidSignature(String),

    #[error("authentication failed")]
    AuthenticationFailed,
}

pub type Result<T> = std::result::Result<T, Error>;
