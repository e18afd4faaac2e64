//! Error taxonomy for the extractor
//!
//! Errors split into two groups: user-actionable failures (configuration,
//! credentials, rejected queries) and unexpected failures (network exhaustion,
//! malformed service responses, local I/O). The binary maps them to distinct
//! exit codes.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractorError>;

/// Exit code for failures the user can fix (config, credentials, queries)
pub const EXIT_USER_ERROR: i32 = 1;

/// Exit code for internal/unexpected failures
pub const EXIT_UNEXPECTED_ERROR: i32 = 2;

/// Failures raised by an [`HttpTransport`](crate::api::transport::HttpTransport)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Could not refresh access token. Received {status} - {body}")]
    TokenRefresh { status: u16, body: String },

    #[error("Token endpoint returned no access token")]
    MissingAccessToken,

    #[error("Request to {url} is still unauthorized after refreshing the access token")]
    Unauthorized { url: String },
}

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Request to {url} failed with status {status}: {message}")]
    Api {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Could not query endpoint \"{endpoint}\". Received: {status} - {message}{}", hint_suffix(.hint))]
    Query {
        endpoint: String,
        status: u16,
        message: String,
        hint: Option<String>,
    },

    #[error("Network error after retries were exhausted: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed response from Dynamics 365: {0}")]
    Metadata(String),

    #[error("Failed to write output: {0}")]
    Output(String),
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_deref().map(|h| format!(" {}", h)).unwrap_or_default()
}

impl ExtractorError {
    pub fn config(message: impl Into<String>) -> Self {
        ExtractorError::Config(message.into())
    }

    /// Whether the failure is something the user can fix in configuration or data
    pub fn is_user_error(&self) -> bool {
        match self {
            ExtractorError::Config(_) | ExtractorError::Auth(_) | ExtractorError::Query { .. } => true,
            ExtractorError::Api { status, .. } => (400..500).contains(status),
            ExtractorError::Transport(_)
            | ExtractorError::Metadata(_)
            | ExtractorError::Output(_) => false,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_user_error() {
            EXIT_USER_ERROR
        } else {
            EXIT_UNEXPECTED_ERROR
        }
    }
}

/// Exit code for an error surfaced at the binary edge
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<ExtractorError>()
        .map(ExtractorError::exit_code)
        .unwrap_or(EXIT_UNEXPECTED_ERROR)
}

impl From<std::io::Error> for ExtractorError {
    fn from(error: std::io::Error) -> Self {
        ExtractorError::Output(error.to_string())
    }
}

impl From<csv::Error> for ExtractorError {
    fn from(error: csv::Error) -> Self {
        ExtractorError::Output(error.to_string())
    }
}
