//! Data exchanged with the RelayDesk server.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub date_joined: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Room {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<User>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub message_count: u64,
}

/// A chat message.
///
/// Fields the client does not know about (reactions, attachments, ...) are
/// kept in `extra` and survive a round trip untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    /// Empty when the server did not assign one.
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub username: String,
    /// The author object as sent by the server.
    #[serde(default)]
    pub user: Value,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Author name, falling back to the nested user object.
    pub fn author(&self) -> &str {
        if !self.username.is_empty() {
            return &self.username;
        }
        self.user
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A dismissible notice shown to the user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub level: NotificationLevel,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

// Servers send ids as strings (UUIDs) or integers.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_keeps_unknown_fields() {
        let value = json!({
            "id": "9f1c",
            "room": "general",
            "user": {"id": 3, "username": "alice"},
            "username": "alice",
            "content": "hi",
            "created_at": "2024-05-01T10:00:00Z",
            "is_edited": false,
            "reactions": [{"emoji": "+1", "count": 2}]
        });
        let message = Message::from_value(value.clone()).unwrap();
        assert_eq!(message.id, "9f1c");
        assert_eq!(message.author(), "alice");
        assert_eq!(message.extra["reactions"], json!([{"emoji": "+1", "count": 2}]));
        assert_eq!(serde_json::to_value(&message).unwrap(), value);
    }

    #[test]
    fn numeric_ids_and_sparse_payloads() {
        let message = Message::from_value(json!({"id": 17, "user": {"username": "bob"}})).unwrap();
        assert_eq!(message.id, "17");
        assert_eq!(message.author(), "bob");
        assert!(!message.is_edited);

        let unsaved = Message::from_value(json!({"content": "no id"})).unwrap();
        assert_eq!(unsaved.id, "");
        assert_eq!(unsaved.content, "no id");
        assert!(Message::from_value(json!({"id": null})).is_err());
    }

    #[test]
    fn room_from_listing() {
        let room: Room = serde_json::from_value(json!({
            "id": "r1",
            "name": "General",
            "slug": "general",
            "description": null,
            "created_by": {"id": 1, "username": "admin", "email": "a@b.c", "date_joined": "2024-01-01"},
            "created_at": "2024-01-01",
            "message_count": 42
        }))
        .unwrap();
        assert_eq!(room.slug, "general");
        assert_eq!(room.description, None);
        assert_eq!(room.created_by.unwrap().username, "admin");
        assert_eq!(room.message_count, 42);
    }
}
