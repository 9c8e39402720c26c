//! JSON frames exchanged over the chat socket.
//!
//! Every frame is one text message carrying an object tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames the client sends.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Join { message: String },
    Ping,
    ChatMessage { message: String },
}

impl OutboundFrame {
    pub fn join(message: impl Into<String>) -> Self {
        Self::Join {
            message: message.into(),
        }
    }

    pub fn chat_message(message: impl Into<String>) -> Self {
        Self::ChatMessage {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Ping => "ping",
            Self::ChatMessage { .. } => "chat_message",
        }
    }
}

/// Frames the server sends.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// A chat message; the payload is relayed untouched.
    ChatMessage {
        #[serde(default)]
        message: Value,
    },
    /// An application-level error meant for the user.
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// Any other `type` (presence, typing indicators, pongs, ...).
    #[serde(other)]
    Unknown,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
