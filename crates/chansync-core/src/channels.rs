//! Channel storage
//!
//! The sync subsystem only reads channels; the management API owns writes and
//! notifies the [`ScheduleManager`](crate::ScheduleManager) afterwards.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use std::path::Path;

use crate::db;
use crate::error::{Result, SyncError};
use crate::types::{Channel, ChannelRow};

/// Read access to configured channels
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Load one channel
    async fn get(&self, channel_id: &str) -> Result<Option<Channel>>;

    /// All channels with sync enabled, ordered by ID
    async fn list_enabled(&self) -> Result<Vec<Channel>>;
}

/// SQLite-backed channel store
pub struct SqliteChannelStore {
    pool: Pool<Sqlite>,
}

impl SqliteChannelStore {
    /// Create a new store from database path
    pub async fn from_path(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        Self::with_pool(pool).await
    }

    /// Create a store on an existing pool
    pub async fn with_pool(pool: Pool<Sqlite>) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                id TEXT PRIMARY KEY,
                schedule TEXT,
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                credentials TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_channels_enabled ON channels(enabled)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert or replace a channel
    pub async fn upsert(&self, channel: &Channel) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO channels (id, schedule, enabled, credentials, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                schedule = excluded.schedule,
                enabled = excluded.enabled,
                credentials = excluded.credentials,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&channel.id)
        .bind(&channel.schedule)
        .bind(channel.enabled)
        .bind(&channel.credentials)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a channel
    pub async fn delete(&self, channel_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM channels WHERE id = ?")
            .bind(channel_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::ChannelNotFound(channel_id.to_string()));
        }

        Ok(())
    }

    /// List all channels
    pub async fn list_all(&self) -> Result<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(
            "SELECT id, schedule, enabled, credentials FROM channels ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Channel::from).collect())
    }
}

#[async_trait]
impl ChannelStore for SqliteChannelStore {
    async fn get(&self, channel_id: &str) -> Result<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as(
            "SELECT id, schedule, enabled, credentials FROM channels WHERE id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Channel::from))
    }

    async fn list_enabled(&self) -> Result<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(
            r#"
            SELECT id, schedule, enabled, credentials FROM channels
            WHERE enabled = TRUE
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Channel::from).collect())
    }
}
