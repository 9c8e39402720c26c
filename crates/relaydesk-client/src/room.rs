//! State of one open chat room and the actor that owns it.

use crate::error::ClientError;
use crate::models::{Message, Notification, NotificationLevel};
use actix::prelude::*;
use log::{debug, info, warn};
use relaydesk_transport::{Close, ConnectionEvent, ConnectionState, OutboundFrame, SendFrame};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Changes pushed to whoever renders the room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomUpdate {
    HistoryLoaded { count: usize },
    MessageAppended(Message),
    ConnectionChanged(ConnectionState),
    Reconnecting { attempt: u32, delay: Duration },
    Notified(Notification),
    NotificationDismissed(String),
}

/// Messages, connection indicator and notifications of a room.
#[derive(Debug)]
pub struct ChatState {
    messages: Vec<Message>,
    connection: ConnectionState,
    notifications: Vec<Notification>,
    next_notification: u64,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            connection: ConnectionState::Idle,
            notifications: Vec::new(),
            next_notification: 0,
        }
    }
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Replaces the message list with the room history.
    pub fn load_history(&mut self, messages: Vec<Message>) -> RoomUpdate {
        self.messages = messages;
        RoomUpdate::HistoryLoaded {
            count: self.messages.len(),
        }
    }

    pub fn apply(&mut self, event: ConnectionEvent) -> Option<RoomUpdate> {
        match event {
            ConnectionEvent::StateChanged(state) => {
                self.connection = state;
                Some(RoomUpdate::ConnectionChanged(state))
            }
            ConnectionEvent::RetryScheduled { attempt, delay } => {
                Some(RoomUpdate::Reconnecting { attempt, delay })
            }
            ConnectionEvent::ChatMessage(payload) if is_empty_payload(&payload) => {
                debug!("Ignoring empty chat message payload");
                None
            }
            ConnectionEvent::ChatMessage(payload) => match Message::from_value(payload) {
                Ok(message) => {
                    self.messages.push(message.clone());
                    Some(RoomUpdate::MessageAppended(message))
                }
                Err(e) => {
                    warn!("Dropping undecodable chat message: {}", e);
                    None
                }
            },
            ConnectionEvent::ServerError(text) => {
                Some(RoomUpdate::Notified(self.notify(NotificationLevel::Error, text)))
            }
            ConnectionEvent::ConnectionLost { attempts } => {
                let text = format!(
                    "Connection lost after {} reconnect attempts. Rejoin the room to try again.",
                    attempts
                );
                Some(RoomUpdate::Notified(self.notify(NotificationLevel::Error, text)))
            }
        }
    }

    /// Trimmed text ready to send, if sending is allowed right now.
    pub fn prepare_submission(&self, text: &str) -> Result<String, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        if self.connection != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        Ok(text.to_string())
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) -> Notification {
        self.next_notification += 1;
        let notification = Notification {
            id: format!("n{}", self.next_notification),
            level,
            message: message.into(),
            timestamp: now_millis(),
        };
        self.notifications.push(notification.clone());
        notification
    }

    pub fn dismiss(&mut self, id: &str) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.id != id);
        self.notifications.len() != before
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// --- Actor Messages ---

/// Replaces the message list (room bootstrap).
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct LoadHistory(pub Vec<Message>);

/// Sends a chat message to the room.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), ClientError>")]
pub struct SubmitMessage(pub String);

/// Removes a notification; answers whether it existed.
#[derive(Message, Debug, Clone)]
#[rtype(result = "bool")]
pub struct DismissNotification(pub String);

#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "RoomSnapshot")]
pub struct GetRoomSnapshot;

/// Stops the room actor, closing its connection.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct LeaveRoom;

#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_slug: String,
    pub connection: ConnectionState,
    pub messages: Vec<Message>,
    pub notifications: Vec<Notification>,
}

// --- Actor Implementation ---

/// Owns the [`ChatState`] of one room and its connection.
///
/// Connection events arrive as messages and are folded into the state in
/// mailbox order; every change is forwarded to the optional observer.
pub struct ChatRoomActor {
    room_slug: String,
    state: ChatState,
    frames: Recipient<SendFrame>,
    closer: Recipient<Close>,
    observer: Option<mpsc::UnboundedSender<RoomUpdate>>,
}

impl ChatRoomActor {
    pub fn new(
        room_slug: impl Into<String>,
        frames: Recipient<SendFrame>,
        closer: Recipient<Close>,
        observer: Option<mpsc::UnboundedSender<RoomUpdate>>,
    ) -> Self {
        Self {
            room_slug: room_slug.into(),
            state: ChatState::new(),
            frames,
            closer,
            observer,
        }
    }

    fn publish(&mut self, update: RoomUpdate) {
        if let Some(observer) = &self.observer {
            if observer.send(update).is_err() {
                debug!("Room observer went away, no longer publishing updates");
                self.observer = None;
            }
        }
    }
}

impl Actor for ChatRoomActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("ChatRoomActor started for room '{}'", self.room_slug);
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        info!("ChatRoomActor for '{}' stopping, closing connection.", self.room_slug);
        if self.closer.connected() {
            self.closer.do_send(Close);
        }
        Running::Stop
    }
}

impl Handler<ConnectionEvent> for ChatRoomActor {
    type Result = ();

    fn handle(&mut self, msg: ConnectionEvent, _ctx: &mut Context<Self>) {
        if let Some(update) = self.state.apply(msg) {
            self.publish(update);
        }
    }
}

impl Handler<LoadHistory> for ChatRoomActor {
    type Result = ();

    fn handle(&mut self, msg: LoadHistory, _ctx: &mut Context<Self>) {
        let update = self.state.load_history(msg.0);
        self.publish(update);
    }
}

impl Handler<SubmitMessage> for ChatRoomActor {
    type Result = Result<(), ClientError>;

    fn handle(&mut self, msg: SubmitMessage, _ctx: &mut Context<Self>) -> Self::Result {
        let text = self.state.prepare_submission(&msg.0)?;
        if !self.frames.connected() {
            return Err(ClientError::NotConnected);
        }
        self.frames.do_send(SendFrame(OutboundFrame::chat_message(text)));
        Ok(())
    }
}

impl Handler<DismissNotification> for ChatRoomActor {
    type Result = bool;

    fn handle(&mut self, msg: DismissNotification, _ctx: &mut Context<Self>) -> bool {
        let removed = self.state.dismiss(&msg.0);
        if removed {
            self.publish(RoomUpdate::NotificationDismissed(msg.0));
        }
        removed
    }
}

impl Handler<GetRoomSnapshot> for ChatRoomActor {
    type Result = MessageResult<GetRoomSnapshot>;

    fn handle(&mut self, _msg: GetRoomSnapshot, _ctx: &mut Context<Self>) -> Self::Result {
        MessageResult(RoomSnapshot {
            room_slug: self.room_slug.clone(),
            connection: self.state.connection(),
            messages: self.state.messages().to_vec(),
            notifications: self.state.notifications().to_vec(),
        })
    }
}

impl Handler<LeaveRoom> for ChatRoomActor {
    type Result = ();

    fn handle(&mut self, _msg: LeaveRoom, ctx: &mut Context<Self>) {
        ctx.stop();
    }
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}
