//! JSON-RPC 2.0 over line-delimited stdio, plus the MCP tool catalogue.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::{handle_tool_call, SharedState};
use crate::mindmap::{ColorScheme, MAX_HISTORY_ENTRIES};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// Name reported in the initialize handshake.
pub const SERVER_NAME: &str = "mcp-langbase-mindmap";
/// MCP protocol revision implemented.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

/// Incoming JSON-RPC message. A missing `id` marks a notification.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Outgoing JSON-RPC message; exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// `null` when the request id was absent or unreadable
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    fn envelope(id: Option<Value>, result: Option<Value>, error: Option<JsonRpcError>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result,
            error,
        }
    }

    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self::envelope(id, Some(result), None)
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        let error = JsonRpcError {
            code,
            message: message.into(),
            data: None,
        };
        Self::envelope(id, None, Some(error))
    }
}

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl Tool {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Body of a `tools/call` result: one text item, flagged when the tool failed.
fn tool_output(text: String, is_error: bool) -> Value {
    let mut output = json!({ "content": [{ "type": "text", "text": text }] });
    if is_error {
        output["isError"] = Value::Bool(true);
    }
    output
}

/// Serves MCP requests against shared application state.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve stdin/stdout until the client closes stdin.
    pub async fn run(&self) -> std::io::Result<()> {
        info!(server = SERVER_NAME, "MCP server listening on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Read one JSON-RPC message per line and answer each request on its own line.
    ///
    /// Blank lines are skipped. Unparseable lines get a parse error with a null id.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!(request = %line, "<- message");

            let reply = match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    warn!(error = %e, "Unparseable message");
                    Some(JsonRpcResponse::error(
                        None,
                        PARSE_ERROR,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            if let Some(reply) = reply {
                let encoded = serde_json::to_string(&reply)?;
                debug!(response = %encoded, "-> message");
                writer.write_all(encoded.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Dispatch one message. Notifications never get a reply.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let reply = match method.as_str() {
            "initialize" => JsonRpcResponse::success(id, initialize_result()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(id, params).await,
            // Requests run one at a time, so a cancellation has nothing left to stop.
            "initialized" | "notifications/initialized" | "notifications/cancelled" => {
                debug!(method = %method, "Notification acknowledged");
                return None;
            }
            other if id.is_none() => {
                debug!(method = %other, "Ignoring unknown notification");
                return None;
            }
            other => {
                error!(method = %other, "Unknown method");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other))
            }
        };

        Some(reply)
    }

    async fn call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params");
        };
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e))
            }
        };

        info!(tool = %params.name, "tools/call");

        let output = match handle_tool_call(&self.state, &params.name, params.arguments).await {
            Ok(result) => match serde_json::to_string_pretty(&result) {
                Ok(text) => tool_output(text, false),
                Err(e) => tool_output(format!("Error: {}", e), true),
            },
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call failed");
                tool_output(format!("Error: {}", e), true)
            }
        };

        JsonRpcResponse::success(id, output)
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

/// Every tool this server exposes, in advertised order.
pub fn tool_definitions() -> Vec<Tool> {
    let schemes: Vec<&str> = ColorScheme::ALL.iter().map(ColorScheme::as_str).collect();

    vec![
        Tool::new(
            "mindmap_generate",
            "Generate a radial mind map from a free-text request. Always returns a valid map; \
             when the model output is unusable a keyword-based starter map is returned instead.",
            json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "What the mind map should be about"
                    },
                    "sessionId": {
                        "type": "string",
                        "description": "Optional session ID; maps in a session can be evolved"
                    },
                    "isEvolution": {
                        "type": "boolean",
                        "description": "Extend the existing map instead of starting over"
                    },
                    "colorScheme": {
                        "type": "string",
                        "enum": schemes,
                        "description": "Color scheme; unknown names use the default"
                    },
                    "existingNodes": {
                        "type": "array",
                        "items": node_schema(),
                        "description": "Nodes of the map being evolved; defaults to the session's latest map"
                    },
                    "conversationHistory": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": format!(
                            "Earlier requests, oldest first; the last {} are used",
                            MAX_HISTORY_ENTRIES
                        )
                    }
                },
                "required": ["input"],
                "additionalProperties": false
            }),
        ),
        Tool::new(
            "mindmap_get",
            "Fetch a previously generated mind map by ID.",
            json!({
                "type": "object",
                "properties": {
                    "mindMapId": {
                        "type": "string",
                        "description": "ID returned by mindmap_generate"
                    }
                },
                "required": ["mindMapId"],
                "additionalProperties": false
            }),
        ),
        Tool::new(
            "mindmap_list",
            "List stored mind maps, newest first.",
            json!({
                "type": "object",
                "properties": {
                    "sessionId": {
                        "type": "string",
                        "description": "Only list maps from this session"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "description": "Maximum number of maps (default 20)"
                    }
                },
                "additionalProperties": false
            }),
        ),
        Tool::new(
            "mindmap_layout",
            "Compute radial positions for an existing node list. Nodes whose parent \
             cannot be placed are reported as anomalies.",
            json!({
                "type": "object",
                "properties": {
                    "nodes": {
                        "type": "array",
                        "items": node_schema(),
                        "minItems": 1
                    },
                    "colorScheme": {
                        "type": "string",
                        "enum": schemes,
                        "description": "Repaint the nodes with this scheme"
                    }
                },
                "required": ["nodes"],
                "additionalProperties": false
            }),
        ),
        Tool::new(
            "mindmap_color_schemes",
            "List the available color schemes and their per-level colors.",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        ),
    ]
}

fn node_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "label": { "type": "string" },
            "type": { "type": "string", "enum": ["root", "main", "sub", "detail"] },
            "parent": { "type": "string" },
            "color": { "type": "string" }
        },
        "required": ["id", "label", "type"]
    })
}
