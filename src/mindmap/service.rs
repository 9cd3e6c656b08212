use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::builder::{GraphBuilder, GraphSource};
use super::layout::LayoutAnomaly;
use super::types::{connections_from_parents, Connection, MindMapParams, MindMapResponse, Node};
use super::validate::check_tiers;
use crate::error::{AppResult, InvalidInputError, StorageError};
use crate::storage::{Invocation, MindMapRecord, MindMapSummary, Session, SqliteStorage, Storage};

/// Default number of maps returned by a listing.
pub const DEFAULT_LIST_LIMIT: u32 = 20;
/// Upper bound on a listing.
pub const MAX_LIST_LIMIT: u32 = 100;

/// Parameters for fetching a stored map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    pub mind_map_id: String,
}

/// Parameters for listing stored maps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Parameters for laying out caller-supplied nodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutParams {
    pub nodes: Vec<Node>,
    /// Repaint the nodes with this scheme when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
}

/// Positioned nodes with their derived connections
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResponse {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    pub anomalies: Vec<LayoutAnomaly>,
}

/// Mind map tool handler: builds maps and keeps them per session.
///
/// Storage is best-effort here. A failed write is logged and the built map
/// is still returned to the caller.
#[derive(Clone)]
pub struct MindMapMode {
    storage: SqliteStorage,
    builder: GraphBuilder,
    pipe_name: String,
}

impl MindMapMode {
    /// Create a new mind map handler
    pub fn new(storage: SqliteStorage, builder: GraphBuilder, pipe_name: impl Into<String>) -> Self {
        Self {
            storage,
            builder,
            pipe_name: pipe_name.into(),
        }
    }

    /// Get the graph builder
    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// Build a map for the request and store it under its session.
    pub async fn generate(&self, params: MindMapParams) -> AppResult<MindMapResponse> {
        let start = Instant::now();

        if params.input.trim().is_empty() {
            return Err(InvalidInputError::new("input", "Input cannot be empty").into());
        }

        let session_id = self.ensure_session(params.session_id.as_deref()).await;
        let params = match &session_id {
            Some(id) => self.seed_evolution(params, id).await,
            None => params,
        };

        debug!(
            session_id = ?session_id,
            is_evolution = params.is_evolution,
            existing_nodes = params.existing_nodes.len(),
            "Processing mind map request"
        );

        let mut invocation = Invocation::new(
            "mindmap_generate",
            serde_json::to_value(&params).unwrap_or_default(),
        )
        .with_pipe(&self.pipe_name);
        if let Some(id) = &session_id {
            invocation = invocation.with_session(id);
        }

        let outcome = match self.builder.build_with_source(&params).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let latency = start.elapsed().as_millis() as i64;
                self.log(invocation.failure(e.to_string(), latency)).await;
                return Err(e.into());
            }
        };

        let used_fallback = outcome.source.is_fallback();
        let mut mind_map_id = None;
        if let Some(id) = &session_id {
            let record = MindMapRecord::new(id, params.input.trim(), outcome.mind_map.clone())
                .with_fallback(used_fallback);
            match self.storage.save_mind_map(&record).await {
                Ok(()) => mind_map_id = Some(record.id),
                Err(e) => warn!(error = %e, session_id = %id, "Failed to store mind map"),
            }
        }

        let latency = start.elapsed().as_millis() as i64;
        invocation = invocation.success(
            serde_json::json!({
                "title": outcome.mind_map.title,
                "nodes": outcome.mind_map.nodes.len(),
                "mindMapId": mind_map_id,
            }),
            latency,
        );
        if let GraphSource::Fallback { reason } = &outcome.source {
            invocation = invocation.with_fallback(reason.to_string());
        }
        self.log(invocation).await;

        info!(
            session_id = ?session_id,
            mind_map_id = ?mind_map_id,
            fallback = used_fallback,
            latency_ms = latency,
            "Mind map generation completed"
        );

        Ok(MindMapResponse {
            success: true,
            mind_map: outcome.mind_map,
            mind_map_id,
            session_id,
        })
    }

    /// Fetch a stored map by ID.
    pub async fn get(&self, params: GetParams) -> AppResult<MindMapRecord> {
        if params.mind_map_id.trim().is_empty() {
            return Err(InvalidInputError::new("mindMapId", "Mind map ID cannot be empty").into());
        }

        self.storage
            .get_mind_map(&params.mind_map_id)
            .await?
            .ok_or_else(|| {
                StorageError::MindMapNotFound {
                    mind_map_id: params.mind_map_id.clone(),
                }
                .into()
            })
    }

    /// List stored maps, newest first.
    pub async fn list(&self, params: ListParams) -> AppResult<Vec<MindMapSummary>> {
        let limit = params
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let records = self
            .storage
            .list_mind_maps(params.session_id.as_deref(), limit)
            .await?;

        Ok(records.iter().map(MindMapRecord::summary).collect())
    }

    /// Recompute positions for caller-supplied nodes.
    ///
    /// Each node must sit one tier below its parent; nodes whose parent is absent
    /// are left unplaced and reported as anomalies.
    pub fn layout_nodes(&self, params: LayoutParams) -> AppResult<LayoutResponse> {
        if params.nodes.is_empty() {
            return Err(InvalidInputError::new("nodes", "At least one node is required").into());
        }

        check_tiers(&params.nodes)
            .map_err(|violation| InvalidInputError::new("nodes", violation.to_string()))?;

        let mut nodes = params.nodes;
        if let Some(name) = params.color_scheme.as_deref() {
            self.builder.resolve_scheme(Some(name)).paint(&mut nodes);
        }
        let anomalies = self.builder.layout().apply(&mut nodes);
        let connections = connections_from_parents(&nodes);

        Ok(LayoutResponse {
            nodes,
            connections,
            anomalies,
        })
    }

    /// Look up or create the session; `None` when storage is unavailable.
    async fn ensure_session(&self, requested: Option<&str>) -> Option<String> {
        let requested = requested.map(str::trim).filter(|id| !id.is_empty());

        if let Some(id) = requested {
            match self.storage.get_session(id).await {
                Ok(Some(mut session)) => {
                    session.touch();
                    if let Err(e) = self.storage.update_session(&session).await {
                        warn!(error = %e, session_id = %id, "Failed to touch session");
                    }
                    return Some(session.id);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, session_id = %id, "Session lookup failed");
                    return None;
                }
            }
        }

        let session = match requested {
            Some(id) => Session::with_id(id),
            None => Session::new(),
        };
        match self.storage.create_session(&session).await {
            Ok(()) => Some(session.id),
            Err(e) => {
                warn!(error = %e, "Failed to create session");
                None
            }
        }
    }

    /// Fill in an evolution request's context from the session's latest map.
    async fn seed_evolution(&self, mut params: MindMapParams, session_id: &str) -> MindMapParams {
        if !params.is_evolution || !params.existing_nodes.is_empty() {
            return params;
        }

        match self.storage.get_latest_mind_map(session_id).await {
            Ok(Some(previous)) => {
                debug!(
                    session_id = %session_id,
                    previous_id = %previous.id,
                    "Seeding evolution from stored map"
                );
                params.existing_nodes = previous.mind_map.nodes;
                if params.conversation_history.is_empty() {
                    params.conversation_history.push(previous.input);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, session_id = %session_id, "Failed to load previous map"),
        }

        params
    }

    async fn log(&self, invocation: Invocation) {
        if let Err(e) = self.storage.log_invocation(&invocation).await {
            warn!(error = %e, tool = %invocation.tool_name, "Failed to log invocation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::error::{AppError, LangbaseResult};
    use crate::langbase::CompletionBackend;
    use crate::mindmap::types::NodeType;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FixedBackend {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        async fn complete(&self, _system: &str, user_prompt: &str) -> LangbaseResult<String> {
            self.prompts.lock().unwrap().push(user_prompt.to_string());
            Ok(self.response.clone())
        }
    }

    async fn mode_with(response: &str) -> (MindMapMode, Arc<FixedBackend>, SqliteStorage) {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let backend = Arc::new(FixedBackend {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let builder = GraphBuilder::new(backend.clone(), &GenerationConfig::default());
        (
            MindMapMode::new(storage.clone(), builder, "mindmap-generator-v1"),
            backend,
            storage,
        )
    }

    const MAP: &str = r#"{"nodes": [
        {"id": "root", "label": "Garden", "type": "root"},
        {"id": "m1", "label": "Vegetables", "type": "main", "parent": "root"}
    ]}"#;

    #[tokio::test]
    async fn test_generate_stores_map_and_logs() {
        let (mode, _, storage) = mode_with(MAP).await;

        let response = mode
            .generate(MindMapParams::new("plan a garden"))
            .await
            .unwrap();

        assert!(response.success);
        let id = response.mind_map_id.clone().unwrap();
        let stored = storage.get_mind_map(&id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Garden");
        assert!(!stored.used_fallback);

        let invocations = storage
            .get_invocations(Some("mindmap_generate"), 10)
            .await
            .unwrap();
        assert_eq!(invocations.len(), 1);
        assert!(!invocations[0].fallback_used);
    }

    #[tokio::test]
    async fn test_generate_records_fallback() {
        let (mode, _, storage) = mode_with("no json here").await;

        let response = mode
            .generate(MindMapParams::new("plan a product launch"))
            .await
            .unwrap();

        assert!(response.success);
        let stored = storage
            .get_mind_map(response.mind_map_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(stored.used_fallback);

        let invocations = storage.get_invocations(None, 10).await.unwrap();
        assert!(invocations[0].fallback_used);
        assert!(invocations[0].error.is_some());
    }

    #[tokio::test]
    async fn test_generate_empty_input() {
        let (mode, backend, _) = mode_with(MAP).await;
        let err = mode.generate(MindMapParams::new("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_evolution_seeded_from_latest_map() {
        let (mode, backend, _) = mode_with(MAP).await;

        let first = mode
            .generate(MindMapParams::new("plan a garden").with_session("s1"))
            .await
            .unwrap();
        assert_eq!(first.session_id.as_deref(), Some("s1"));

        mode.generate(
            MindMapParams::new("add flowers")
                .with_session("s1")
                .evolving(vec![]),
        )
        .await
        .unwrap();

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[1].contains("- m1 [main] Vegetables (parent: root)"));
        assert!(prompts[1].contains("- plan a garden"));
    }

    #[tokio::test]
    async fn test_get_and_list() {
        let (mode, _, _) = mode_with(MAP).await;
        let response = mode
            .generate(MindMapParams::new("plan a garden").with_session("s1"))
            .await
            .unwrap();
        mode.generate(MindMapParams::new("other").with_session("s2"))
            .await
            .unwrap();

        let record = mode
            .get(GetParams {
                mind_map_id: response.mind_map_id.unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(record.session_id, "s1");

        let all = mode.list(ListParams::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let s1 = mode
            .list(ListParams {
                session_id: Some("s1".to_string()),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(s1.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (mode, _, _) = mode_with(MAP).await;
        let err = mode
            .get(GetParams {
                mind_map_id: "nope".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Storage(StorageError::MindMapNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_layout_nodes() {
        let (mode, _, _) = mode_with(MAP).await;
        let response = mode
            .layout_nodes(LayoutParams {
                nodes: vec![
                    Node::new("r", "Root", NodeType::Root),
                    Node::new("m", "Main", NodeType::Main).with_parent("r"),
                    Node::new("s", "Orphan", NodeType::Sub).with_parent("missing"),
                ],
                color_scheme: Some("calmGreen".to_string()),
            })
            .unwrap();

        assert_eq!(response.nodes[0].position.map(|p| (p.x, p.y)), Some((400.0, 300.0)));
        assert!(response.nodes[2].position.is_none());
        assert_eq!(response.anomalies.len(), 1);
        assert_eq!(response.connections.len(), 2);
        assert!(!response.nodes[0].color.is_empty());
    }

    #[tokio::test]
    async fn test_layout_nodes_rejects_tier_mismatch() {
        let (mode, _, _) = mode_with(MAP).await;
        let err = mode
            .layout_nodes(LayoutParams {
                nodes: vec![
                    Node::new("r", "Root", NodeType::Root),
                    Node::new("s", "Sub", NodeType::Sub).with_parent("r"),
                    Node::new("m", "Main", NodeType::Main).with_parent("r"),
                    Node::new("d", "Detail", NodeType::Detail).with_parent("m"),
                ],
                color_scheme: None,
            })
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("sub node s cannot hang under root node r"));
    }
}
