//! # coterie-protocol
//!
//! Wire protocol definitions for the Coterie chat server.
//!
//! This crate defines the JSON event protocol spoken between chat clients
//! and the gateway, along with the entities that cross the wire.
//!
//! ## Events
//!
//! - `hello` / `rooms` - identity announcement and the room list reply
//! - `room:join` / `room:history` - room subscription and recent history
//! - `message:new` / `message` - posting and broadcast of messages
//! - `message:deleted` - admin deletion notice, sent to every client
//! - `typing` - typing indicators, relayed to everyone else in the room
//!
//! ## Example
//!
//! ```rust
//! use coterie_protocol::{codec, ClientEvent};
//!
//! let event = codec::decode(r#"{"type":"room:join","slug":"general"}"#).unwrap();
//! assert_eq!(event, ClientEvent::join_room("general"));
//! ```

pub mod codec;
pub mod events;

pub use codec::{decode, encode, ProtocolError, MAX_EVENT_SIZE};
pub use events::{ChatMessage, ClientEvent, Room, ServerEvent, UserInfo};
