//! Error taxonomy shared by the provider and backend clients.

/// Errors surfaced by the chat client, the backend API client and the stores.
///
/// Variants carry owned strings rather than transport errors so the type can be
/// cloned into stream events and broadcast to every waiter of a token refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed ({status}): {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed stream frame: {0}")]
    StreamParse(String),

    #[error("Authentication expired")]
    AuthExpired,

    #[error("Server error {code}: {message}")]
    Business { code: i64, message: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        ClientError::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Whether the error came from the caller cancelling the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidFormat(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}
