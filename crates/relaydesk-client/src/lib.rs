//! # RelayDesk Client Library
//!
//! Application side of the chat client. It ties the REST API, the persisted
//! session and the realtime transport together into joinable rooms.
//!
//! A [`RoomSession`] owns a [`ChatRoomActor`] (room state) wired to a
//! `ConnectionActor` from `relaydesk-transport` (live channel).

pub mod api;
pub mod error;
pub mod models;
pub mod room;
pub mod session;
pub mod storage;

pub use api::{ApiClient, LoginResponse, RefreshGate};
pub use error::{ApiError, ClientError, StorageError};
pub use models::{Message, Notification, NotificationLevel, Room, User};
pub use room::{
    ChatRoomActor, ChatState, DismissNotification, GetRoomSnapshot, LeaveRoom, LoadHistory,
    RoomSnapshot, RoomUpdate, SubmitMessage,
};
pub use session::RoomSession;
pub use storage::{FileStore, Theme, TokenStore, UiPreferences};

// Re-export core types needed to set up a session
pub use relaydesk_core::Config;
pub use relaydesk_transport::ConnectionState;
