//! Error taxonomy for the Tickspot client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TickspotError>;

#[derive(Error, Debug)]
pub enum TickspotError {
    /// Missing or malformed client configuration (tenant, credentials, base URL).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation was called with an invalid combination of arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// The request never produced a response (connect, TLS, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] wreq::Error),

    /// The service answered with a non-success status.
    #[error("request failed with status {status}")]
    Status { status: u16, body: String },

    /// A response body the client had to interpret was not the expected XML.
    #[error("unexpected XML: {0}")]
    Xml(String),

    /// The HTML login or an undocumented project URL failed.
    #[error("scraping fallback failed: {0}")]
    Scrape(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl TickspotError {
    /// HTTP status of the failed request, when the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
