//! Command-line interface.
//!
//! With no subcommand the binary runs the MCP server on stdio. The other
//! commands build a single map and print it as JSON on stdout.

use clap::{Parser, Subcommand};

use crate::mindmap::{fallback, ColorScheme, MindMapParams};
use crate::server::AppState;

/// MCP server that turns free text into laid-out mind maps.
#[derive(Parser, Debug)]
#[command(name = "mcp-langbase-mindmap", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the MCP server over stdio (default)
    Serve,

    /// Generate one mind map through Langbase and print it
    Generate {
        /// What the mind map should be about
        #[arg(long)]
        input: String,

        /// Color scheme name (unknown names use the default)
        #[arg(long)]
        color_scheme: Option<String>,

        /// Store the map under this session
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Print the offline keyword map without calling Langbase
    Fallback {
        /// Text to pull keywords from
        #[arg(long)]
        input: String,

        /// Color scheme name (unknown names use the default)
        #[arg(long)]
        color_scheme: Option<String>,
    },
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute `generate` against fully initialized state.
pub async fn execute_generate(
    state: &AppState,
    input: String,
    color_scheme: Option<String>,
    session_id: Option<String>,
) -> CliResult {
    let params = MindMapParams {
        input,
        session_id,
        color_scheme,
        ..MindMapParams::default()
    };

    match state.mindmap_mode.generate(params).await {
        Ok(response) => to_json(&response),
        Err(e) => CliResult::error(format!("Generation failed: {}", e)),
    }
}

/// Execute `fallback`; needs no configuration or network.
pub fn execute_fallback(input: &str, color_scheme: Option<&str>) -> CliResult {
    if input.trim().is_empty() {
        return CliResult::error("Input cannot be empty");
    }
    let map = fallback(input, ColorScheme::from_name_or_default(color_scheme));
    to_json(&map)
}

fn to_json<T: serde::Serialize>(value: &T) -> CliResult {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliResult::success(json),
        Err(e) => CliResult::error(format!("Failed to serialize output: {}", e)),
    }
}
