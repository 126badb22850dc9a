//! # coterie-core
//!
//! Session and room coordination for the Coterie chat server.
//!
//! This crate provides the in-process state the gateway routes with:
//!
//! - **Registry** - connection -> room subscription table and event fan-out
//! - **UserIdentity** - session-held identity with display-name limits
//! - **ReadOnlyRooms** - write policy for configured read-only rooms
//! - **sanitize_message** / **validate_slug** - input normalization
//!
//! Durable state (rooms, message history) lives in `coterie-store`; the
//! registry holds only transient per-connection state and is discarded on
//! disconnect.

pub mod identity;
pub mod policy;
pub mod registry;
pub mod slug;
pub mod text;

pub use identity::{normalize_display_name, UserIdentity, GUEST_NAME, MAX_DISPLAY_NAME_LEN};
pub use policy::ReadOnlyRooms;
pub use registry::{ConnectionId, Envelope, Registry, RegistryError, RegistryStats};
pub use slug::validate_slug;
pub use text::{sanitize_message, MAX_MESSAGE_LEN};
