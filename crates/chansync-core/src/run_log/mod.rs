//! Run log storage using SQLite
//!
//! Durable history of every sync attempt. The store does not enforce
//! single-flight; that is the orchestrator's job.

mod migrations;
mod queries;


use sqlx::{Pool, Sqlite};
use std::path::Path;

use crate::db;
use crate::error::Result;

/// SQLite-based run log
pub struct RunLogStore {
    pub(super) pool: Pool<Sqlite>,
}

impl RunLogStore {
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
}
