//! Crate-wide error type.
//!
//! Variants are grouped by how the caller is expected to react:
//! startup and run-level failures end the run, everything raised inside a
//! single article attempt is folded into a [`crate::models::LinkOutcome`]
//! by the acquisition loop and never escapes it.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required credential: {0}")]
    MissingCredential(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("no page is loaded in the browsing context")]
    NoPage,

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("link discovery failed: {0}")]
    Discovery(String),

    #[error("browsing context is not authenticated")]
    NotAuthenticated,

    #[error("AI service error: {0}")]
    Ai(String),

    #[error("vision service error: {0}")]
    Vision(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Startup and run-level failures. Anything else is recoverable at the
    /// granularity of a single link or input file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::MissingCredential(_)
                | Error::Config(_)
                | Error::Discovery(_)
                | Error::NotAuthenticated
        )
    }

    /// Process exit code for an error that ended a command.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Discovery(_) => 2,
            Error::NotAuthenticated => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
