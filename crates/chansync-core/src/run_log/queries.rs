use super::RunLogStore;
use crate::error::{Result, SyncError};
use crate::types::{RunRow, RunState, SyncMode, SyncRun};
use chrono::Utc;
use uuid::Uuid;

const RUN_COLUMNS: &str = "id, channel_id, mode, state, started_at, completed_at, error";

impl RunLogStore {
    /// Insert a `running` record and return its ID
    pub async fn open(&self, channel_id: &str, mode: SyncMode) -> Result<Uuid> {
        let run_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO sync_runs (id, channel_id, mode, state, started_at)
            VALUES (?, ?, ?, 'running', ?)
            "#,
        )
        .bind(run_id.to_string())
        .bind(channel_id)
        .bind(mode.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(run_id)
    }

    /// Move a `running` record to a terminal state
    ///
    /// A missing record or one that is already terminal is a bookkeeping
    /// defect and is reported as an error.
    pub async fn close(&self, run_id: Uuid, state: RunState, error: Option<&str>) -> Result<()> {
        if self.close_if_running(run_id, state, error).await? {
            return Ok(());
        }

        let current = self.get(run_id).await?;
        Err(SyncError::InvalidTransition {
            run_id,
            state: current.state,
        })
    }

    /// Move a record to a terminal state if it is still `running`
    ///
    /// Returns `false` when the record exists in a terminal state or not at all.
    pub async fn close_if_running(
        &self,
        run_id: Uuid,
        state: RunState,
        error: Option<&str>,
    ) -> Result<bool> {
        if !state.is_terminal() {
            return Err(SyncError::InvalidConfig(format!(
                "cannot close run {} as {}",
                run_id, state
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE sync_runs
            SET state = ?, completed_at = ?, error = ?
            WHERE id = ? AND state = 'running'
            "#,
        )
        .bind(state.as_str())
        .bind(Utc::now())
        .bind(error)
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a run by ID
    pub async fn get(&self, run_id: Uuid) -> Result<SyncRun> {
        let row: RunRow = sqlx::query_as(&format!("SELECT {} FROM sync_runs WHERE id = ?", RUN_COLUMNS))
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(SyncError::RunNotFound(run_id))?;

        row.try_into()
    }

    /// Most recent runs across all channels, newest first
    pub async fn latest(&self, limit: i64) -> Result<Vec<SyncRun>> {
        let rows: Vec<RunRow> = sqlx::query_as(&format!(
            "SELECT {} FROM sync_runs ORDER BY started_at DESC, rowid DESC LIMIT ?",
            RUN_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Most recent runs for one channel, newest first
    pub async fn for_channel(&self, channel_id: &str, limit: i64) -> Result<Vec<SyncRun>> {
        let rows: Vec<RunRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM sync_runs
            WHERE channel_id = ?
            ORDER BY started_at DESC, rowid DESC
            LIMIT ?
            "#,
            RUN_COLUMNS
        ))
        .bind(channel_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Records currently `running`, optionally scoped to one channel
    pub async fn running_for(&self, channel_id: Option<&str>) -> Result<Vec<SyncRun>> {
        let rows: Vec<RunRow> = match channel_id {
            Some(channel_id) => {
                sqlx::query_as(&format!(
                    r#"
                    SELECT {} FROM sync_runs
                    WHERE state = 'running' AND channel_id = ?
                    ORDER BY started_at ASC, rowid ASC
                    "#,
                    RUN_COLUMNS
                ))
                .bind(channel_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    r#"
                    SELECT {} FROM sync_runs
                    WHERE state = 'running'
                    ORDER BY started_at ASC, rowid ASC
                    "#,
                    RUN_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}
