//! Error types for the juris-db crate.
//!
//! Model queries surface `sqlx::Error` directly; this type only covers
//! the crate's own operations.

use thiserror::Error;

/// Database-layer errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}
