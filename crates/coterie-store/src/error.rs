//! Store errors.

use thiserror::Error;

/// Errors surfaced by the persistence store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A room with this slug already exists.
    #[error("Slug already exists: {0}")]
    Conflict(String),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map a unique-constraint violation on insert to [`StoreError::Conflict`].
    pub(crate) fn conflict_on_unique(slug: &str, err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => Self::Conflict(slug.to_string()),
            _ => Self::Database(err),
        }
    }
}
