//! Event types for the Coterie wire protocol.
//!
//! Events are the fundamental unit of communication between the chat client
//! and the gateway. Each event is serialized as a JSON object carrying a
//! `type` discriminator; field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// A chat room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Opaque room identifier.
    pub id: String,
    /// Unique, URL-safe identifier used in events and routes.
    pub slug: String,
    /// Human-readable display name.
    pub name: String,
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Opaque message identifier.
    pub id: String,
    /// Room the message belongs to.
    pub room_id: String,
    /// Sender display name as captured at send time.
    pub user_name: String,
    /// Message body.
    pub text: String,
    /// Creation time in Unix milliseconds.
    pub created_at: i64,
}

/// User identity as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Opaque user identifier.
    pub id: String,
    /// Display name (already truncated server-side).
    pub display_name: String,
    /// Whether this session holds admin rights.
    pub is_admin: bool,
}

/// Events sent from the client to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Announce identity after connecting.
    ///
    /// All fields are optional on the wire; the gateway substitutes a fresh
    /// id and a `Guest` display name for anything missing.
    #[serde(rename = "hello", rename_all = "camelCase")]
    Hello {
        /// User identifier from the join response.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Display name from the join response.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        /// Admin flag from the session.
        #[serde(default)]
        is_admin: bool,
    },

    /// Subscribe to a room, leaving the previously joined room.
    #[serde(rename = "room:join")]
    JoinRoom {
        /// Target room slug.
        slug: String,
    },

    /// Post a message to a room.
    #[serde(rename = "message:new")]
    NewMessage {
        /// Target room slug.
        slug: String,
        /// Raw message text (sanitized server-side).
        text: String,
    },

    /// Typing state change.
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        /// Target room slug.
        slug: String,
        /// Whether the user is currently typing.
        is_typing: bool,
    },
}

/// Events pushed from the gateway to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Full room list, pushed after `hello`.
    #[serde(rename = "rooms")]
    Rooms {
        /// All rooms, sorted by name.
        rooms: Vec<Room>,
    },

    /// Recent history for a freshly joined room.
    #[serde(rename = "room:history")]
    History {
        /// Room slug.
        slug: String,
        /// Recent messages, oldest first.
        messages: Vec<ChatMessage>,
        /// Whether the room is read-only for this user.
        readonly: bool,
    },

    /// A message broadcast to the room it was posted in.
    #[serde(rename = "message")]
    Message {
        /// The persisted message.
        message: ChatMessage,
    },

    /// A message was deleted by an admin; sent to every connected client.
    #[serde(rename = "message:deleted")]
    MessageDeleted {
        /// Identifier of the deleted message.
        id: String,
    },

    /// Another user's typing state in the current room.
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        /// Display name of the typing user.
        user: String,
        /// Whether they are typing.
        is_typing: bool,
    },
}

impl ClientEvent {
    /// Create a new Hello event from a user identity.
    #[must_use]
    pub fn hello(user: &UserInfo) -> Self {
        ClientEvent::Hello {
            id: Some(user.id.clone()),
            display_name: Some(user.display_name.clone()),
            is_admin: user.is_admin,
        }
    }

    /// Create a new JoinRoom event.
    #[must_use]
    pub fn join_room(slug: impl Into<String>) -> Self {
        ClientEvent::JoinRoom { slug: slug.into() }
    }

    /// Create a new NewMessage event.
    #[must_use]
    pub fn new_message(slug: impl Into<String>, text: impl Into<String>) -> Self {
        ClientEvent::NewMessage {
            slug: slug.into(),
            text: text.into(),
        }
    }

    /// Create a new Typing event.
    #[must_use]
    pub fn typing(slug: impl Into<String>, is_typing: bool) -> Self {
        ClientEvent::Typing {
            slug: slug.into(),
            is_typing,
        }
    }
}

impl ServerEvent {
    /// Create a new Rooms event.
    #[must_use]
    pub fn rooms(rooms: Vec<Room>) -> Self {
        ServerEvent::Rooms { rooms }
    }

    /// Create a new History event.
    #[must_use]
    pub fn history(slug: impl Into<String>, messages: Vec<ChatMessage>, readonly: bool) -> Self {
        ServerEvent::History {
            slug: slug.into(),
            messages,
            readonly,
        }
    }

    /// Create a new Message event.
    #[must_use]
    pub fn message(message: ChatMessage) -> Self {
        ServerEvent::Message { message }
    }

    /// Create a new MessageDeleted event.
    #[must_use]
    pub fn message_deleted(id: impl Into<String>) -> Self {
        ServerEvent::MessageDeleted { id: id.into() }
    }

    /// Create a new Typing event.
    #[must_use]
    pub fn typing(user: impl Into<String>, is_typing: bool) -> Self {
        ServerEvent::Typing {
            user: user.into(),
            is_typing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_wire_names() {
        let json = serde_json::to_value(ClientEvent::join_room("general")).unwrap();
        assert_eq!(json["type"], "room:join");
        assert_eq!(json["slug"], "general");

        let json = serde_json::to_value(ClientEvent::typing("general", true)).unwrap();
        assert_eq!(json["type"], "typing");
        assert_eq!(json["isTyping"], true);
    }

    #[test]
    fn test_hello_tolerates_missing_fields() {
        let event: ClientEvent = serde_json::from_str(r#"{"type":"hello"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Hello {
                id: None,
                display_name: None,
                is_admin: false,
            }
        );
    }

    #[test]
    fn test_chat_message_camel_case() {
        let message = ChatMessage {
            id: "m1".into(),
            room_id: "r1".into(),
            user_name: "Alice".into(),
            text: "hi".into(),
            created_at: 1_700_000_000_000,
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["roomId"], "r1");
        assert_eq!(json["userName"], "Alice");
        assert_eq!(json["createdAt"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_server_event_wire_names() {
        let json = serde_json::to_value(ServerEvent::message_deleted("m1")).unwrap();
        assert_eq!(json["type"], "message:deleted");
        assert_eq!(json["id"], "m1");

        let json = serde_json::to_value(ServerEvent::history("general", vec![], false)).unwrap();
        assert_eq!(json["type"], "room:history");
        assert_eq!(json["readonly"], false);
    }
}
