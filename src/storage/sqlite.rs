use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::{Invocation, MindMapRecord, Session, Storage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const MIND_MAP_COLUMNS: &str =
    "id, session_id, input, title, mind_map, used_fallback, created_at";

const INVOCATION_COLUMNS: &str = "id, session_id, tool_name, input, output, pipe_name, \
     latency_ms, success, fallback_used, error, created_at";

/// SQLite store for sessions, mind maps and the invocation log.
///
/// Timestamps are RFC 3339 text and JSON payloads are stored as text.
/// Listings are newest first, with insertion order breaking ties.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database file and apply migrations.
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        if let Some(dir) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory {}: {}", dir.display(), e),
            })?;
        }

        let options = connect_options(&format!("sqlite://{}", config.path.display()))?
            .create_if_missing(true);
        info!(path = %config.path.display(), "Opening mind map database");
        Self::open(options, config.max_connections).await
    }

    /// Private in-memory database. Limited to one connection, since every
    /// `:memory:` connection is its own database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        Self::open(connect_options("sqlite::memory:")?, 1).await
    }

    /// Underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options.foreign_keys(true))
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: e.to_string(),
            })?;
        debug!("Database schema up to date");

        Ok(Self { pool })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_session(&self, session: &Session) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO sessions (id, created_at, updated_at, metadata) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .bind(json_text(session.metadata.as_ref())?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, id: &str) -> StorageResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, created_at, updated_at, metadata FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Session::from))
    }

    async fn update_session(&self, session: &Session) -> StorageResult<()> {
        let updated = sqlx::query("UPDATE sessions SET updated_at = ?, metadata = ? WHERE id = ?")
            .bind(session.updated_at.to_rfc3339())
            .bind(json_text(session.metadata.as_ref())?)
            .bind(&session.id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(StorageError::SessionNotFound {
                session_id: session.id.clone(),
            });
        }
        Ok(())
    }

    // Maps go with the session through ON DELETE CASCADE.
    async fn delete_session(&self, id: &str) -> StorageResult<()> {
        let deleted = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            debug!(session_id = %id, "Delete of unknown session ignored");
        }
        Ok(())
    }

    async fn save_mind_map(&self, record: &MindMapRecord) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO mind_maps ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            MIND_MAP_COLUMNS
        );

        sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.session_id)
            .bind(&record.input)
            .bind(&record.title)
            .bind(json_text(Some(&record.mind_map))?)
            .bind(record.used_fallback)
            .bind(record.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_mind_map(&self, id: &str) -> StorageResult<Option<MindMapRecord>> {
        let sql = format!("SELECT {} FROM mind_maps WHERE id = ?", MIND_MAP_COLUMNS);
        let row: Option<MindMapRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MindMapRecord::try_from).transpose()
    }

    async fn get_latest_mind_map(&self, session_id: &str) -> StorageResult<Option<MindMapRecord>> {
        Ok(self
            .list_mind_maps(Some(session_id), 1)
            .await?
            .into_iter()
            .next())
    }

    async fn list_mind_maps(
        &self,
        session_id: Option<&str>,
        limit: u32,
    ) -> StorageResult<Vec<MindMapRecord>> {
        let sql = format!(
            "SELECT {} FROM mind_maps \
             WHERE (?1 IS NULL OR session_id = ?1) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            MIND_MAP_COLUMNS
        );
        let rows: Vec<MindMapRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(MindMapRecord::try_from).collect()
    }

    async fn delete_mind_map(&self, id: &str) -> StorageResult<()> {
        let deleted = sqlx::query("DELETE FROM mind_maps WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(StorageError::MindMapNotFound {
                mind_map_id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO invocations ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            INVOCATION_COLUMNS
        );

        sqlx::query(&sql)
            .bind(&invocation.id)
            .bind(&invocation.session_id)
            .bind(&invocation.tool_name)
            .bind(json_text(Some(&invocation.input))?)
            .bind(json_text(invocation.output.as_ref())?)
            .bind(&invocation.pipe_name)
            .bind(invocation.latency_ms)
            .bind(invocation.success)
            .bind(invocation.fallback_used)
            .bind(&invocation.error)
            .bind(invocation.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_invocations(
        &self,
        tool_name: Option<&str>,
        limit: u32,
    ) -> StorageResult<Vec<Invocation>> {
        let sql = format!(
            "SELECT {} FROM invocations \
             WHERE (?1 IS NULL OR tool_name = ?1) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            INVOCATION_COLUMNS
        );
        let rows: Vec<InvocationRow> = sqlx::query_as(&sql)
            .bind(tool_name)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Invocation::from).collect())
    }
}

fn connect_options(url: &str) -> StorageResult<SqliteConnectOptions> {
    SqliteConnectOptions::from_str(url).map_err(|e| StorageError::Connection {
        message: format!("Invalid database URL {}: {}", url, e),
    })
}

fn json_text<T: Serialize + ?Sized>(value: Option<&T>) -> StorageResult<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StorageError::Query {
            message: format!("Failed to encode JSON column: {}", e),
        })
}

fn json_column(column: &str, text: Option<&str>) -> Option<Value> {
    let text = text?;
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(column, error = %e, "Unreadable JSON column");
            None
        }
    }
}

fn timestamp(value: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            warn!(value, error = %e, "Unreadable timestamp, using now");
            Utc::now()
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    created_at: String,
    updated_at: String,
    metadata: Option<String>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            metadata: json_column("sessions.metadata", row.metadata.as_deref()),
            created_at: timestamp(&row.created_at),
            updated_at: timestamp(&row.updated_at),
            id: row.id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MindMapRow {
    id: String,
    session_id: String,
    input: String,
    title: String,
    mind_map: String,
    used_fallback: bool,
    created_at: String,
}

// The map body is the record's payload, so unlike the other JSON columns a bad one is an error.
impl TryFrom<MindMapRow> for MindMapRecord {
    type Error = StorageError;

    fn try_from(row: MindMapRow) -> Result<Self, Self::Error> {
        let mind_map = serde_json::from_str(&row.mind_map).map_err(|e| StorageError::Query {
            message: format!("Corrupt mind map {}: {}", row.id, e),
        })?;

        Ok(Self {
            created_at: timestamp(&row.created_at),
            id: row.id,
            session_id: row.session_id,
            input: row.input,
            title: row.title,
            mind_map,
            used_fallback: row.used_fallback,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvocationRow {
    id: String,
    session_id: Option<String>,
    tool_name: String,
    input: String,
    output: Option<String>,
    pipe_name: Option<String>,
    latency_ms: Option<i64>,
    success: bool,
    fallback_used: bool,
    error: Option<String>,
    created_at: String,
}

impl From<InvocationRow> for Invocation {
    fn from(row: InvocationRow) -> Self {
        Self {
            input: json_column("invocations.input", Some(&row.input)).unwrap_or(Value::Null),
            output: json_column("invocations.output", row.output.as_deref()),
            created_at: timestamp(&row.created_at),
            id: row.id,
            session_id: row.session_id,
            tool_name: row.tool_name,
            pipe_name: row.pipe_name,
            latency_ms: row.latency_ms,
            success: row.success,
            fallback_used: row.fallback_used,
            error: row.error,
        }
    }
}
