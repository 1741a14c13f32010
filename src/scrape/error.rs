//! Scrape error taxonomy.

use crate::crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transport-level failure talking to the portal or wiki.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The portal bounced the login to its error page.
    #[error("portal rejected the credentials")]
    InvalidCredentials,

    /// A page did not contain what the selectors expect.
    #[error("parse error: {0}")]
    Parse(String),

    /// A parsed record could not be matched to a stored song/beatmap.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Stored credentials could not be decrypted.
    #[error("credential decryption failed: {0}")]
    Encryption(#[from] CryptoError),

    /// Shutdown requested while waiting or retrying.
    #[error("cancelled")]
    Cancelled,
}

impl ScrapeError {
    pub fn parse(message: impl Into<String>) -> Self {
        ScrapeError::Parse(message.into())
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        ScrapeError::Resolution(message.into())
    }
}
