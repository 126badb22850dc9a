//! Connection and room registry for the realtime gateway.
//!
//! The registry owns the transient mapping from connections to their
//! identity and single room subscription, and fans events out to room
//! subscribers or to every connected client.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::identity::UserIdentity;
use coterie_protocol::ServerEvent;

/// A connection identifier, assigned by the gateway at upgrade time.
pub type ConnectionId = String;

/// Default broadcast channel capacity.
///
/// A lagging receiver skips past missed envelopes rather than blocking
/// the room.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The connection was never registered or already disconnected.
    #[error("Connection not registered: {0}")]
    UnknownConnection(ConnectionId),

    /// The connection has not announced an identity yet.
    #[error("Connection has not announced an identity: {0}")]
    NotIdentified(ConnectionId),
}

/// An event wrapped for fan-out.
///
/// Envelopes are `Arc`-shared across all receivers of a broadcast; the
/// optional source lets a connection's outbound loop skip events it
/// originated (typing indicators exclude the sender).
#[derive(Debug)]
pub struct Envelope {
    /// Connection that originated the event, if any.
    pub source: Option<ConnectionId>,
    /// The event to deliver.
    pub event: ServerEvent,
}

impl Envelope {
    fn new(event: ServerEvent) -> Self {
        Self {
            source: None,
            event,
        }
    }

    fn from_source(source: impl Into<ConnectionId>, event: ServerEvent) -> Self {
        Self {
            source: Some(source.into()),
            event,
        }
    }

    /// Whether this envelope originated from the given connection.
    #[must_use]
    pub fn is_from(&self, connection_id: &str) -> bool {
        self.source.as_deref() == Some(connection_id)
    }
}

/// Per-connection transient state.
#[derive(Default)]
struct ConnectionState {
    user: Option<UserIdentity>,
    room: Option<String>,
}

/// Fan-out channel for one room, created on first subscriber.
struct RoomChannel {
    sender: broadcast::Sender<Arc<Envelope>>,
    subscribers: HashSet<ConnectionId>,
}

impl RoomChannel {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscribers: HashSet::new(),
        }
    }
}

/// The gateway's connection/room table.
///
/// Owned by the server for its lifetime; connections insert themselves on
/// upgrade and are removed on disconnect. Room channels exist only while
/// they have subscribers.
pub struct Registry {
    /// Connections indexed by id.
    connections: DashMap<ConnectionId, ConnectionState>,
    /// Room channels indexed by slug.
    rooms: DashMap<String, RoomChannel>,
    /// Channel for events every client must see regardless of room.
    global: broadcast::Sender<Arc<Envelope>>,
    /// Capacity for room and global channels.
    capacity: usize,
}

impl Registry {
    /// Create a registry with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a registry with a specific channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (global, _) = broadcast::channel(capacity);
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            global,
            capacity,
        }
    }

    /// Register a connection.
    ///
    /// Returns the receiver for global events. The connection starts
    /// unidentified and subscribed to no room.
    pub fn connect(&self, connection_id: impl Into<ConnectionId>) -> broadcast::Receiver<Arc<Envelope>> {
        let id = connection_id.into();
        self.connections.insert(id.clone(), ConnectionState::default());
        debug!(connection = %id, "Connection registered");
        self.global.subscribe()
    }

    /// Bind an identity to a connection.
    ///
    /// Repeated announcements re-bind; the latest identity wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is not registered.
    pub fn identify(&self, connection_id: &str, user: UserIdentity) -> Result<(), RegistryError> {
        let mut conn = self
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| RegistryError::UnknownConnection(connection_id.to_string()))?;

        debug!(
            connection = %connection_id,
            user = %user.display_name,
            admin = user.is_admin,
            "Identity announced"
        );
        conn.user = Some(user);
        Ok(())
    }

    /// Get the identity bound to a connection, if announced.
    #[must_use]
    pub fn identity(&self, connection_id: &str) -> Option<UserIdentity> {
        self.connections
            .get(connection_id)
            .and_then(|c| c.user.clone())
    }

    /// Get the room a connection is currently subscribed to.
    #[must_use]
    pub fn current_room(&self, connection_id: &str) -> Option<String> {
        self.connections
            .get(connection_id)
            .and_then(|c| c.room.clone())
    }

    /// Subscribe a connection to a room, leaving its previous room.
    ///
    /// Exactly one room subscription is held at a time; re-subscribing to
    /// the current room is permitted and returns a fresh receiver.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is unknown or unidentified.
    pub fn subscribe(
        &self,
        connection_id: &str,
        slug: &str,
    ) -> Result<broadcast::Receiver<Arc<Envelope>>, RegistryError> {
        {
            let conn = self
                .connections
                .get(connection_id)
                .ok_or_else(|| RegistryError::UnknownConnection(connection_id.to_string()))?;
            if conn.user.is_none() {
                return Err(RegistryError::NotIdentified(connection_id.to_string()));
            }
        }

        let previous = self
            .connections
            .get_mut(connection_id)
            .and_then(|mut c| c.room.take());
        if let Some(prev) = previous {
            self.leave_room(connection_id, &prev);
        }

        let receiver = {
            let mut entry = self.rooms.entry(slug.to_string()).or_insert_with(|| {
                debug!(room = %slug, "Creating room channel");
                RoomChannel::new(self.capacity)
            });
            entry.subscribers.insert(connection_id.to_string());
            entry.sender.subscribe()
        };

        if let Some(mut conn) = self.connections.get_mut(connection_id) {
            conn.room = Some(slug.to_string());
        }

        debug!(
            connection = %connection_id,
            room = %slug,
            subscribers = self.subscriber_count(slug),
            "Subscribed"
        );

        Ok(receiver)
    }

    /// Remove a connection and its subscription.
    ///
    /// No presence event is emitted.
    pub fn disconnect(&self, connection_id: &str) {
        if let Some((_, state)) = self.connections.remove(connection_id) {
            if let Some(room) = state.room {
                self.leave_room(connection_id, &room);
            }
            debug!(connection = %connection_id, "Connection removed");
        }
    }

    /// Publish an event to every subscriber of a room.
    ///
    /// Returns the number of receivers. A room with no subscribers is a
    /// no-op returning 0.
    pub fn publish(&self, slug: &str, event: ServerEvent) -> usize {
        self.publish_envelope(slug, Envelope::new(event))
    }

    /// Publish an event tagged with its source connection.
    ///
    /// Receivers use [`Envelope::is_from`] to skip events they originated.
    pub fn publish_from(&self, slug: &str, source: &str, event: ServerEvent) -> usize {
        self.publish_envelope(slug, Envelope::from_source(source, event))
    }

    /// Publish an event to every connected client regardless of room.
    pub fn broadcast_all(&self, event: ServerEvent) -> usize {
        self.global
            .send(Arc::new(Envelope::new(event)))
            .unwrap_or_default()
    }

    /// Get the subscriber count for a room.
    #[must_use]
    pub fn subscriber_count(&self, slug: &str) -> usize {
        self.rooms
            .get(slug)
            .map(|r| r.subscribers.len())
            .unwrap_or(0)
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            connection_count: self.connections.len(),
            room_count: self.rooms.len(),
            subscription_count: self.rooms.iter().map(|r| r.subscribers.len()).sum(),
        }
    }

    fn publish_envelope(&self, slug: &str, envelope: Envelope) -> usize {
        if let Some(entry) = self.rooms.get(slug) {
            let count = entry.sender.send(Arc::new(envelope)).unwrap_or_default();
            trace!(room = %slug, recipients = count, "Published event");
            count
        } else {
            trace!(room = %slug, "Publish to room with no subscribers");
            0
        }
    }

    fn leave_room(&self, connection_id: &str, slug: &str) {
        if let Some(mut entry) = self.rooms.get_mut(slug) {
            entry.subscribers.remove(connection_id);

            debug!(
                connection = %connection_id,
                room = %slug,
                subscribers = entry.subscribers.len(),
                "Unsubscribed"
            );

            if entry.subscribers.is_empty() {
                drop(entry); // Release the lock
                self.rooms.remove(slug);
                debug!(room = %slug, "Removed empty room channel");
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry statistics.
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Number of registered connections.
    pub connection_count: usize,
    /// Number of rooms with at least one subscriber.
    pub room_count: usize,
    /// Total number of room subscriptions.
    pub subscription_count: usize,
}
