//! Persistence for sessions, generated maps and the tool invocation log.
//!
//! [`Storage`] is the seam the service layer talks to; [`SqliteStorage`]
//! is the only implementation.

mod sqlite;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StorageResult;
use crate::mindmap::MindMap;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_session(&self, session: &Session) -> StorageResult<()>;
    async fn get_session(&self, id: &str) -> StorageResult<Option<Session>>;
    /// Fails with `SessionNotFound` when no row matches.
    async fn update_session(&self, session: &Session) -> StorageResult<()>;
    /// Removes the session together with its stored maps.
    async fn delete_session(&self, id: &str) -> StorageResult<()>;

    async fn save_mind_map(&self, record: &MindMapRecord) -> StorageResult<()>;
    async fn get_mind_map(&self, id: &str) -> StorageResult<Option<MindMapRecord>>;
    /// Most recently saved map of a session; the seed for evolution requests.
    async fn get_latest_mind_map(&self, session_id: &str) -> StorageResult<Option<MindMapRecord>>;
    /// Newest first, across all sessions when `session_id` is `None`.
    async fn list_mind_maps(
        &self,
        session_id: Option<&str>,
        limit: u32,
    ) -> StorageResult<Vec<MindMapRecord>>;
    /// Fails with `MindMapNotFound` when no row matches.
    async fn delete_mind_map(&self, id: &str) -> StorageResult<()>;

    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()>;
    /// Newest first, across all tools when `tool_name` is `None`.
    async fn get_invocations(
        &self,
        tool_name: Option<&str>,
        limit: u32,
    ) -> StorageResult<Vec<Invocation>>;
}

/// Groups the maps of one conversation so later requests can evolve them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Option<Value>,
}

impl Session {
    /// Fresh session with a random UUID.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Session under a caller-chosen ID, e.g. the `sessionId` tool argument.
    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            metadata: None,
        }
    }

    pub fn with_metadata(self, metadata: Value) -> Self {
        Self {
            metadata: Some(metadata),
            ..self
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A built map together with the request that produced it.
///
/// `title` repeats `mind_map.title` so listings need not decode the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapRecord {
    pub id: String,
    pub session_id: String,
    pub input: String,
    pub title: String,
    pub mind_map: MindMap,
    pub used_fallback: bool,
    pub created_at: DateTime<Utc>,
}

impl MindMapRecord {
    pub fn new(session_id: impl Into<String>, input: impl Into<String>, mind_map: MindMap) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            input: input.into(),
            title: mind_map.title.clone(),
            mind_map,
            used_fallback: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_fallback(self, used_fallback: bool) -> Self {
        Self {
            used_fallback,
            ..self
        }
    }

    pub fn summary(&self) -> MindMapSummary {
        MindMapSummary {
            id: self.id.clone(),
            session_id: self.session_id.clone(),
            title: self.title.clone(),
            node_count: self.mind_map.nodes.len(),
            used_fallback: self.used_fallback,
            created_at: self.created_at,
        }
    }
}

/// Row returned by `mindmap_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapSummary {
    pub id: String,
    pub session_id: String,
    pub title: String,
    pub node_count: usize,
    pub used_fallback: bool,
    pub created_at: DateTime<Utc>,
}

/// One tool call as recorded in the invocation log.
///
/// A call that returned the fallback map still counts as a success;
/// `error` then carries the reason the generated output was rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    pub id: String,
    pub session_id: Option<String>,
    pub tool_name: String,
    pub input: Value,
    pub output: Option<Value>,
    pub pipe_name: Option<String>,
    pub latency_ms: Option<i64>,
    pub success: bool,
    pub fallback_used: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Invocation {
    pub fn new(tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: None,
            tool_name: tool_name.into(),
            input,
            output: None,
            pipe_name: None,
            latency_ms: None,
            success: true,
            fallback_used: false,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_session(self, session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..self
        }
    }

    pub fn with_pipe(self, pipe_name: impl Into<String>) -> Self {
        Self {
            pipe_name: Some(pipe_name.into()),
            ..self
        }
    }

    pub fn success(self, output: Value, latency_ms: i64) -> Self {
        Self {
            success: true,
            output: Some(output),
            latency_ms: Some(latency_ms),
            ..self
        }
    }

    pub fn with_fallback(self, reason: impl Into<String>) -> Self {
        Self {
            fallback_used: true,
            error: Some(reason.into()),
            ..self
        }
    }

    pub fn failure(self, error: impl Into<String>, latency_ms: i64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            latency_ms: Some(latency_ms),
            ..self
        }
    }
}
