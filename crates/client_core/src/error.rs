use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with status {status}{}", detail_suffix(.message))]
    Status { status: u16, message: Option<String> },
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Message reported by the server in an `{ "error": ... }` body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
