//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SlotStore` port from the `core` crate. Every persisted slot is one row
//! in a single key/value table managed with `sqlx` over SQLite.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tutor_core::ports::{PortError, PortResult, SlotStore};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SlotStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the slot table if it does not exist yet.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SlotRecord {
    value: String,
}

#[derive(FromRow)]
struct KeyRecord {
    key: String,
}

fn storage_error(e: sqlx::Error) -> PortError {
    PortError::Storage(e.to_string())
}

//=========================================================================================
// `SlotStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SlotStore for DbAdapter {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let record = sqlx::query_as::<_, SlotRecord>("SELECT value FROM slots WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(record.map(|r| r.value))
    }

    async fn put(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO slots (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM slots WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> PortResult<Vec<String>> {
        let records = sqlx::query_as::<_, KeyRecord>(
            "SELECT key FROM slots WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key ASC",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(records.into_iter().map(|r| r.key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn adapter() -> DbAdapter {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let adapter = DbAdapter::new(pool);
        adapter.run_migrations().await.expect("migrations");
        adapter
    }

    #[tokio::test]
    async fn put_overwrites_and_remove_deletes() {
        let db = adapter().await;
        db.put("session:u1:active", "first").await.expect("put");
        db.put("session:u1:active", "second").await.expect("put");
        assert_eq!(
            db.get("session:u1:active").await.expect("get").as_deref(),
            Some("second")
        );

        db.remove("session:u1:active").await.expect("remove");
        assert!(db.get("session:u1:active").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn prefix_listing_is_literal() {
        let db = adapter().await;
        db.put("session:u1:history:2", "b").await.expect("put");
        db.put("session:u1:history:1", "a").await.expect("put");
        db.put("session:u10:history:1", "other user").await.expect("put");
        db.put("session_u1_history_9", "look-alike").await.expect("put");

        let keys = db.keys_with_prefix("session:u1:history:").await.expect("keys");
        assert_eq!(keys, vec!["session:u1:history:1", "session:u1:history:2"]);
    }
}
