//! Errors of the chat client: REST calls, the local store and room sessions.

use relaydesk_core::CoreError;
use thiserror::Error;

/// Failures reading or writing the persisted client state.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("State store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request was rejected as unauthorized")]
    Unauthorized,

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration loading failed: {0}")]
    ConfigError(#[from] CoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Room '{slug}' could not be loaded: {reason}")]
    RoomUnavailable { slug: String, reason: String },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Not connected to the room")]
    NotConnected,

    #[error("Actor mailbox error: {0}")]
    Mailbox(#[from] actix::MailboxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// True when the failure is cured by logging in again.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            ClientError::Api(ApiError::NotAuthenticated | ApiError::SessionExpired)
        )
    }
}
