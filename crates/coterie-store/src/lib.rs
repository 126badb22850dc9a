//! # coterie-store
//!
//! SQLite persistence for the Coterie chat server.
//!
//! Two tables: `rooms` and `messages`. The store exclusively owns durable
//! state; the gateway's connection registry never touches the database
//! directly. There are no multi-statement transactions - each operation is
//! self-contained.

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::Store;
