//! Codec for encoding and decoding Coterie events.
//!
//! Events travel as JSON text frames over the WebSocket, one event per
//! frame. Inbound frames are size-checked before parsing.

use thiserror::Error;

use crate::events::{ClientEvent, ServerEvent};

/// Maximum inbound event size in bytes (64 KiB).
///
/// Well above the 4000-character message cap; anything larger is a
/// misbehaving client and is dropped before JSON parsing.
pub const MAX_EVENT_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_EVENT_SIZE}")]
    FrameTooLarge(usize),

    /// JSON encoding/decoding error, including unknown event types.
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a server event to a JSON text frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(event: &ServerEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode a client event from a JSON text frame.
///
/// # Errors
///
/// Returns an error if the frame is oversized, malformed, or carries an
/// unknown event type.
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    if text.len() > MAX_EVENT_SIZE {
        return Err(ProtocolError::FrameTooLarge(text.len()));
    }

    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChatMessage;

    #[test]
    fn test_decode_client_events() {
        let event = decode(r#"{"type":"message:new","slug":"general","text":"hi"}"#).unwrap();
        assert_eq!(event, ClientEvent::new_message("general", "hi"));

        let event = decode(r#"{"type":"typing","slug":"general","isTyping":false}"#).unwrap();
        assert_eq!(event, ClientEvent::typing("general", false));
    }

    #[test]
    fn test_encode_server_event() {
        let message = ChatMessage {
            id: "m1".into(),
            room_id: "r1".into(),
            user_name: "Alice".into(),
            text: "hi".into(),
            created_at: 1,
        };

        let text = encode(&ServerEvent::message(message)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["message"]["text"], "hi");
    }

    #[test]
    fn test_decode_unknown_type() {
        match decode(r#"{"type":"shrug"}"#) {
            Err(ProtocolError::Malformed(_)) => {}
            other => panic!("Expected Malformed error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_oversized_frame() {
        let padding = "x".repeat(MAX_EVENT_SIZE + 1);
        match decode(&padding) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_not_json() {
        assert!(decode("not json at all").is_err());
    }
}
