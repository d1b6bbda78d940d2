//! SQLite session store.
//!
//! One `sessions` table keyed by session id. The full session is stored as
//! a JSON document; title, node count and timestamps are duplicated into
//! columns so listing never has to parse documents.

use async_trait::async_trait;
use branchloom_core::error::StoreError;
use branchloom_core::session::{ConversationSession, SessionId, SessionSummary};
use branchloom_core::store::SessionStore;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful
    /// for tests). In-memory databases use a single connection, since each
    /// connection would otherwise see its own empty database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let max_connections = if path.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY NOT NULL,
                title       TEXT,
                node_count  INTEGER NOT NULL,
                document    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("updated_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Fixed-width RFC 3339 so that text order matches time order.
    fn timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<SessionSummary, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let title: Option<String> = row
            .try_get("title")
            .map_err(|e| StoreError::QueryFailed(format!("title column: {e}")))?;
        let node_count: i64 = row
            .try_get("node_count")
            .map_err(|e| StoreError::QueryFailed(format!("node_count column: {e}")))?;
        let updated_at_str: String = row
            .try_get("updated_at")
            .map_err(|e| StoreError::QueryFailed(format!("updated_at column: {e}")))?;

        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupted {
                id: id.clone(),
                reason: format!("updated_at: {e}"),
            })?;

        Ok(SessionSummary {
            id: SessionId(id),
            title,
            node_count: usize::try_from(node_count).unwrap_or_default(),
            updated_at,
        })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, session: &ConversationSession) -> Result<(), StoreError> {
        let document = serde_json::to_string(session)
            .map_err(|e| StoreError::Storage(format!("Session serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, title, node_count, document, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                node_count = excluded.node_count,
                document = excluded.document,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.id.0)
        .bind(&session.title)
        .bind(session.nodes.len() as i64)
        .bind(&document)
        .bind(Self::timestamp(&session.created_at))
        .bind(Self::timestamp(&session.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        debug!(session_id = %session.id, nodes = session.len(), "Session saved");
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<ConversationSession>, StoreError> {
        let row = sqlx::query("SELECT document FROM sessions WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET by ID: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let document: String = row
            .try_get("document")
            .map_err(|e| StoreError::QueryFailed(format!("document column: {e}")))?;
        serde_json::from_str(&document)
            .map(Some)
            .map_err(|e| StoreError::Corrupted {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, node_count, updated_at FROM sessions ORDER BY updated_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST: {e}")))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::row_to_summary(row) {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!(error = %e, "Skipping unreadable session row"),
            }
        }
        Ok(summaries)
    }
}
