//! MCP stdio server: protocol loop, tool routing and shared state.

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::langbase::{CompletionBackend, LangbaseClient, PipeBackend};
use crate::mindmap::{GraphBuilder, MindMapMode};
use crate::storage::SqliteStorage;

/// Everything a tool call needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: SqliteStorage,
    pub mindmap_mode: MindMapMode,
}

/// Handle passed to the server and the one-shot CLI commands.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Generate through the configured Langbase pipe.
    pub fn new(config: Config, storage: SqliteStorage, langbase: LangbaseClient) -> Self {
        let backend = PipeBackend::new(langbase, &config.pipes.mindmap);
        Self::with_backend(config, storage, Arc::new(backend))
    }

    /// Upsert the mind map pipe, then build state generating through it.
    ///
    /// A failed upsert is only logged: generation against a missing or
    /// unreachable pipe degrades to the fallback map like any other backend failure.
    pub async fn connect(
        config: Config,
        storage: SqliteStorage,
        langbase: LangbaseClient,
    ) -> Self {
        match langbase.ensure_mindmap_pipe(&config.pipes.mindmap).await {
            Ok(()) => info!(
                pipe = %config.pipes.mindmap,
                base_url = %langbase.base_url(),
                "Mind map pipe available"
            ),
            Err(e) => warn!(
                pipe = %config.pipes.mindmap,
                error = %e,
                "Mind map pipe setup failed; maps will use the fallback until the pipe is reachable"
            ),
        }
        Self::new(config, storage, langbase)
    }

    /// Generate through any [`CompletionBackend`], e.g. a scripted one in tests.
    pub fn with_backend(
        config: Config,
        storage: SqliteStorage,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        info!(
            mindmap_pipe = %config.pipes.mindmap,
            generation_timeout_ms = config.generation.timeout_ms,
            default_color_scheme = %config.generation.default_color_scheme,
            "Building application state"
        );

        let builder = GraphBuilder::new(backend, &config.generation);
        let mindmap_mode = MindMapMode::new(storage.clone(), builder, &config.pipes.mindmap);

        Self {
            config,
            storage,
            mindmap_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DatabaseConfig, GenerationConfig, LangbaseConfig, LogFormat, LoggingConfig, PipeConfig,
        RequestConfig,
    };
    use crate::error::{LangbaseError, LangbaseResult};
    use crate::mindmap::{ColorScheme, MindMapParams};
    use crate::storage::Storage;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct Offline;

    #[async_trait]
    impl CompletionBackend for Offline {
        async fn complete(&self, _system: &str, _user: &str) -> LangbaseResult<String> {
            Err(LangbaseError::Api {
                status: 503,
                message: "offline".to_string(),
            })
        }
    }

    fn test_config() -> Config {
        Config {
            langbase: LangbaseConfig {
                api_key: "test-key".to_string(),
                base_url: "https://api.langbase.com".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            request: RequestConfig::default(),
            pipes: PipeConfig::default(),
            generation: GenerationConfig {
                default_color_scheme: ColorScheme::PineGreen,
                ..GenerationConfig::default()
            },
        }
    }

    #[tokio::test]
    async fn test_new_uses_configured_pipe() {
        let config = test_config();
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let langbase = LangbaseClient::new(&config.langbase, config.request.clone()).unwrap();

        let state = AppState::new(config, storage, langbase);
        assert_eq!(state.config.pipes.mindmap, "mindmap-generator-v1");
    }

    #[tokio::test]
    async fn test_with_backend_generates_and_persists() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let state = AppState::with_backend(test_config(), storage, Arc::new(Offline));

        let response = state
            .mindmap_mode
            .generate(MindMapParams::new("plan a product launch").with_session("s1"))
            .await
            .unwrap();

        assert_eq!(response.mind_map.color_scheme, ColorScheme::PineGreen);
        let stored = state.storage.get_latest_mind_map("s1").await.unwrap().unwrap();
        assert!(stored.used_fallback);
    }
}
