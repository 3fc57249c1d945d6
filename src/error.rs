//! Error types for the chat client, built with `thiserror`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the JSON shape the backend documents.
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A well-formed response that explicitly reports failure.
    #[error("{0}")]
    Application(String),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Log-level classification: both kinds look identical to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Application,
    Local,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) | ClientError::Decode(_) => ErrorKind::Transport,
            ClientError::Application(_) => ErrorKind::Application,
            ClientError::EmptyMessage | ClientError::Config(_) | ClientError::Io(_) => {
                ErrorKind::Local
            }
        }
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
