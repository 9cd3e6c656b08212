//! Mind map MCP server backed by Langbase Pipes.
//!
//! `mindmap_generate` sends a free-text request to a Langbase pipe, recovers
//! whatever JSON the model produced, repairs it into a single-rooted tree of
//! at most four levels ([`mindmap::repair_tree`]) and places every node on
//! fixed radial rings ([`mindmap::layout`]). When the pipe fails, times out,
//! or answers with something unusable, [`mindmap::fallback`] builds a
//! keyword map from the request instead, so a non-empty request always
//! yields a valid map.
//!
//! Maps are stored per session in SQLite; a later request with
//! `isEvolution` extends the session's latest map.
//!
//! ```ignore
//! use std::sync::Arc;
//! use mcp_langbase_mindmap::{AppState, Config, McpServer};
//! use mcp_langbase_mindmap::langbase::LangbaseClient;
//! use mcp_langbase_mindmap::storage::SqliteStorage;
//!
//! let config = Config::from_env()?;
//! let storage = SqliteStorage::new(&config.database).await?;
//! let langbase = LangbaseClient::new(&config.langbase, config.request.clone())?;
//! McpServer::new(Arc::new(AppState::new(config, storage, langbase))).run().await?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
/// Langbase Pipes client and the completion backend seam.
pub mod langbase;
/// Graph building, repair, radial layout and fallback.
pub mod mindmap;
pub mod prompts;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use mindmap::{GraphBuilder, MindMap, MindMapParams, MindMapResponse};
pub use server::{AppState, McpServer, SharedState};
