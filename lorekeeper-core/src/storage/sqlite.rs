//! SQLite-backed session store
//!
//! Each session is one row holding its JSON snapshot, keyed by session id,
//! with secondary indexes on player id and last-update time for the
//! per-player and recency queries. Timestamps are stored as fixed-width
//! RFC 3339 text so that string comparison orders them correctly.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::SessionStore;
use crate::error::{LoreError, Result};
use crate::session::Session;

/// Aggregate numbers about the stored sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Sessions stored
    pub total_sessions: u64,
    /// Sessions updated within the last hour
    pub active_last_hour: u64,
    /// Mean snapshot size in bytes
    pub average_snapshot_bytes: f64,
}

/// SQLite implementation of [`SessionStore`]
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteSessionStore {
    /// Connect to `url`, creating the database file if needed, and ensure
    /// the schema exists.
    ///
    /// In-memory URLs are pinned to a single long-lived connection, since
    /// every SQLite connection would otherwise see its own empty database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect_with(options)
                .await?
        };

        info!(url = %url, in_memory, "Opened SQLite session store");
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and ensure the schema exists
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY CHECK (session_id <> ''),
                player_id TEXT NOT NULL DEFAULT '',
                snapshot_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_update TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_player ON sessions (player_id)")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_last_update ON sessions (last_update)")
            .execute(&pool)
            .await?;

        debug!("Initialized sessions table");
        Ok(Self { pool })
    }

    /// The underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn decode(json: &str) -> Result<Session> {
        serde_json::from_str(json)
            .map_err(|e| LoreError::Storage(format!("Corrupt session snapshot: {}", e)))
    }

    /// Sessions owned by `player_id`, most recently updated first
    pub async fn sessions_for_player(&self, player_id: &str) -> Result<Vec<Session>> {
        let rows = sqlx::query(
            "SELECT snapshot_json FROM sessions WHERE player_id = ? ORDER BY last_update DESC",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::decode(&row.get::<String, _>("snapshot_json")))
            .collect()
    }

    /// Ids of sessions updated at or after `cutoff`, most recent first
    pub async fn active_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT session_id FROM sessions WHERE last_update >= ? ORDER BY last_update DESC",
        )
        .bind(timestamp(cutoff))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Aggregate numbers about the stored sessions
    pub async fn stats(&self) -> Result<StorageStats> {
        let hour_ago = timestamp(Utc::now() - Duration::hours(1));
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN last_update >= ? THEN 1 ELSE 0 END), 0) AS active,
                COALESCE(AVG(LENGTH(snapshot_json)), 0.0) AS avg_size
            FROM sessions
            "#,
        )
        .bind(hour_ago)
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        let active: i64 = row.get("active");
        let avg_size: f64 = row.get("avg_size");

        Ok(StorageStats {
            total_sessions: total.max(0) as u64,
            active_last_hour: active.max(0) as u64,
            average_snapshot_bytes: avg_size,
        })
    }

    /// Every stored session as a pretty-printed JSON array, ordered by id
    pub async fn export_json(&self) -> Result<String> {
        let rows = sqlx::query("SELECT snapshot_json FROM sessions ORDER BY session_id")
            .fetch_all(&self.pool)
            .await?;

        let sessions = rows
            .iter()
            .map(|row| Self::decode(&row.get::<String, _>("snapshot_json")))
            .collect::<Result<Vec<_>>>()?;

        Ok(serde_json::to_string_pretty(&sessions)?)
    }

    /// Write [`export_json`](Self::export_json) output to `path`
    pub async fn backup_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.export_json().await?;
        tokio::fs::write(path.as_ref(), json).await?;
        info!(path = %path.as_ref().display(), "Exported session backup");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, session_id: &str) -> Result<Session> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT snapshot_json FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((json,)) => Self::decode(&json),
            None => Err(LoreError::SessionNotFound(session_id.to_string())),
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, player_id, snapshot_json, created_at, last_update)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (session_id) DO UPDATE SET
                player_id = excluded.player_id,
                snapshot_json = excluded.snapshot_json,
                last_update = excluded.last_update
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.player_id)
        .bind(json)
        .bind(timestamp(session.created_at))
        .bind(timestamp(session.last_update))
        .execute(&self.pool)
        .await?;

        debug!(session_id = %session.session_id, "Saved session snapshot");
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        debug!(session_id = %session_id, "Deleted session snapshot");
        Ok(result.rows_affected() > 0)
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>("SELECT session_id FROM sessions ORDER BY session_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>, keep: &[String]) -> Result<u64> {
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM sessions WHERE last_update < ");
        query.push_bind(timestamp(cutoff));
        if !keep.is_empty() {
            query.push(" AND session_id NOT IN (");
            let mut ids = query.separated(", ");
            for id in keep {
                ids.push_bind(id.as_str());
            }
            ids.push_unseparated(")");
        }

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
