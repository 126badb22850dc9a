//! SQLite persistence for rooms and messages.
//!
//! Every operation is a single self-contained statement; the store's own
//! WAL durability is the only atomicity guarantee the application relies
//! on.

use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use coterie_protocol::{ChatMessage, Room};

/// Rooms created on first boot when the store is empty.
const DEFAULT_ROOMS: [(&str, &str); 4] = [
    ("announcements", "Announcements"),
    ("general", "General"),
    ("events", "Events"),
    ("ideas", "Ideas"),
];

/// Durable storage for rooms and message history.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to the database at `url` and initialize the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Open an ephemeral in-memory store.
    ///
    /// A single pooled connection, so the database survives across calls.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StoreError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                slug TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                user_name TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (room_id) REFERENCES rooms(id)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Create a room.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the slug already exists.
    pub async fn create_room(&self, slug: &str, name: &str) -> Result<Room, StoreError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO rooms (id, slug, name) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(slug)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::conflict_on_unique(slug, e))?;

        Ok(Room {
            id,
            slug: slug.to_string(),
            name: name.to_string(),
        })
    }

    /// List all rooms, sorted by display name.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT id, slug, name FROM rooms ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, slug, name)| Room { id, slug, name })
            .collect())
    }

    /// Look up a room by slug.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn room_by_slug(&self, slug: &str) -> Result<Option<Room>, StoreError> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, slug, name FROM rooms WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, slug, name)| Room { id, slug, name }))
    }

    /// Count rooms; used only for first-run seeding.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn room_count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rooms")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Create the default rooms if the store has none.
    ///
    /// Returns `true` if seeding ran.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn seed_default_rooms(&self) -> Result<bool, StoreError> {
        if self.room_count().await? > 0 {
            return Ok(false);
        }

        for (slug, name) in DEFAULT_ROOMS {
            self.create_room(slug, name).await?;
        }
        info!(rooms = DEFAULT_ROOMS.len(), "Seeded default rooms");
        Ok(true)
    }

    /// Persist a message, assigning its id and timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn create_message(
        &self,
        room_id: &str,
        user_name: &str,
        text: &str,
    ) -> Result<ChatMessage, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_millis();

        sqlx::query(
            "INSERT INTO messages (id, room_id, user_name, text, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(room_id)
        .bind(user_name)
        .bind(text)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(ChatMessage {
            id,
            room_id: room_id.to_string(),
            user_name: user_name.to_string(),
            text: text.to_string(),
            created_at,
        })
    }

    /// Fetch the most recent `limit` messages for a room, oldest first.
    ///
    /// Same-millisecond inserts keep their insertion order (rowid
    /// tie-break).
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn list_messages(
        &self,
        room_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
            "SELECT id, room_id, user_name, text, created_at FROM messages
             WHERE room_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<ChatMessage> = rows
            .into_iter()
            .map(|(id, room_id, user_name, text, created_at)| ChatMessage {
                id,
                room_id,
                user_name,
                text,
                created_at,
            })
            .collect();
        messages.reverse();
        Ok(messages)
    }

    /// Delete a message by id. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn delete_message(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rooms_sorted_by_name() {
        let store = Store::in_memory().await.unwrap();
        store.create_room("zeta", "Zeta").await.unwrap();
        store.create_room("alpha", "Alpha").await.unwrap();

        let rooms = store.list_rooms().await.unwrap();
        let names: Vec<&str> = rooms.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let store = Store::in_memory().await.unwrap();
        store.create_room("general", "General").await.unwrap();

        match store.create_room("general", "Other").await {
            Err(StoreError::Conflict(slug)) => assert_eq!(slug, "general"),
            other => panic!("Expected Conflict, got {:?}", other.map(|r| r.slug)),
        }
    }

    #[tokio::test]
    async fn test_room_by_slug() {
        let store = Store::in_memory().await.unwrap();
        let created = store.create_room("general", "General").await.unwrap();

        let found = store.room_by_slug("general").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(store.room_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seeding_runs_once() {
        let store = Store::in_memory().await.unwrap();
        assert_eq!(store.room_count().await.unwrap(), 0);

        assert!(store.seed_default_rooms().await.unwrap());
        assert_eq!(store.room_count().await.unwrap(), 4);
        assert!(store.room_by_slug("general").await.unwrap().is_some());

        assert!(!store.seed_default_rooms().await.unwrap());
        assert_eq!(store.room_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_message_roundtrip() {
        let store = Store::in_memory().await.unwrap();
        let room = store.create_room("general", "General").await.unwrap();

        let text = "hello ✨ with unicode and  spacing";
        let created = store.create_message(&room.id, "Alice", text).await.unwrap();

        let messages = store.list_messages(&room.id, 200).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, created.id);
        assert_eq!(messages[0].text, text);
        assert_eq!(messages[0].user_name, "Alice");
    }

    #[tokio::test]
    async fn test_history_order_and_limit() {
        let store = Store::in_memory().await.unwrap();
        let room = store.create_room("general", "General").await.unwrap();

        for i in 0..5 {
            store
                .create_message(&room.id, "Alice", &format!("msg-{i}"))
                .await
                .unwrap();
        }

        let all = store.list_messages(&room.id, 200).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert_eq!(all[0].text, "msg-0");
        assert_eq!(all[4].text, "msg-4");

        // Bounded to the most recent `limit`, still oldest-first.
        let recent = store.list_messages(&room.id, 2).await.unwrap();
        let texts: Vec<&str> = recent.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["msg-3", "msg-4"]);
    }

    #[tokio::test]
    async fn test_messages_scoped_to_room() {
        let store = Store::in_memory().await.unwrap();
        let general = store.create_room("general", "General").await.unwrap();
        let events = store.create_room("events", "Events").await.unwrap();

        store
            .create_message(&general.id, "Alice", "hi")
            .await
            .unwrap();

        assert!(store.list_messages(&events.id, 200).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = Store::in_memory().await.unwrap();
        let room = store.create_room("general", "General").await.unwrap();
        let message = store.create_message(&room.id, "Alice", "hi").await.unwrap();

        store.delete_message(&message.id).await.unwrap();
        assert!(store.list_messages(&room.id, 200).await.unwrap().is_empty());

        // Deleting again (or an unknown id) is a no-op.
        store.delete_message(&message.id).await.unwrap();
        store.delete_message("does-not-exist").await.unwrap();
    }
}
