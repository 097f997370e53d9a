//! Error types for the b2c-graph shell.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    GraphApi(#[from] GraphApiError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to call the Graph API")]
    Network(#[source] reqwest::Error),

    #[error("Graph API response body is not valid UTF-8")]
    InvalidBody(#[source] std::string::FromUtf8Error),

    #[error("Failed to create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authentication-related errors raised while acquiring a bearer token.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token request rejected (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Could not reach the token endpoint")]
    Unreachable(#[source] reqwest::Error),

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    #[error("Unsupported token type: {0}")]
    UnsupportedTokenType(String),
}

/// A non-2xx response from the directory API.
///
/// `payload` is the pretty-printed JSON error body, or the raw body when it
/// is not JSON.
#[derive(Error, Debug)]
#[error("Error Calling the Graph API: \n{payload}")]
pub struct GraphApiError {
    pub status: u16,
    pub payload: String,
}

/// Local input problems, detected before any network call.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Could not read JSON file {}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    /// The error message followed by each underlying cause, outermost first.
    pub fn causes(&self) -> Vec<String> {
        let mut causes = vec![self.to_string()];
        let mut current = self.source();
        while let Some(cause) = current {
            causes.push(cause.to_string());
            current = cause.source();
        }
        causes
    }
}
