use std::future::{ready, Future};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::SharedState;
use crate::error::{McpError, McpResult};
use crate::mindmap::{ColorScheme, GetParams, LayoutParams, ListParams, MindMapParams, Palette};

/// Dispatch a `tools/call` to the mind map service and serialize its result.
///
/// Argument errors become [`McpError::InvalidParameters`]; service errors,
/// including empty input, become [`McpError::ExecutionFailed`].
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    debug!(tool = %tool_name, has_arguments = arguments.is_some(), "Dispatching tool");
    let mode = &state.mindmap_mode;

    match tool_name {
        "mindmap_generate" => {
            let params: MindMapParams = required(tool_name, arguments)?;
            run(mode.generate(params)).await
        }
        "mindmap_get" => {
            let params: GetParams = required(tool_name, arguments)?;
            run(mode.get(params)).await
        }
        "mindmap_list" => {
            let params: ListParams = optional(tool_name, arguments)?;
            run(mode.list(params)).await
        }
        "mindmap_layout" => {
            let params: LayoutParams = required(tool_name, arguments)?;
            run(ready(mode.layout_nodes(params))).await
        }
        "mindmap_color_schemes" => {
            color_schemes(state.config.generation.default_color_scheme)
        }
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

/// One entry of the `mindmap_color_schemes` listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorSchemeInfo {
    pub name: &'static str,
    pub is_default: bool,
    pub colors: Palette,
}

fn color_schemes(default: ColorScheme) -> McpResult<Value> {
    let schemes: Vec<ColorSchemeInfo> = ColorScheme::ALL
        .iter()
        .map(|&scheme| ColorSchemeInfo {
            name: scheme.as_str(),
            is_default: scheme == default,
            colors: scheme.palette(),
        })
        .collect();

    Ok(json!({ "schemes": schemes }))
}

fn required<P: DeserializeOwned>(tool_name: &str, arguments: Option<Value>) -> McpResult<P> {
    let arguments = arguments.ok_or_else(|| McpError::InvalidParameters {
        tool_name: tool_name.to_string(),
        message: "Missing arguments".to_string(),
    })?;
    decode(tool_name, arguments)
}

/// For tools whose every argument has a default; absent arguments read as `{}`.
fn optional<P: DeserializeOwned>(tool_name: &str, arguments: Option<Value>) -> McpResult<P> {
    decode(tool_name, arguments.unwrap_or_else(|| json!({})))
}

fn decode<P: DeserializeOwned>(tool_name: &str, arguments: Value) -> McpResult<P> {
    serde_json::from_value(arguments).map_err(|e| McpError::InvalidParameters {
        tool_name: tool_name.to_string(),
        message: e.to_string(),
    })
}

async fn run<R, E>(operation: impl Future<Output = Result<R, E>>) -> McpResult<Value>
where
    R: Serialize,
    E: std::fmt::Display,
{
    let result = operation.await.map_err(|e| McpError::ExecutionFailed {
        message: e.to_string(),
    })?;
    Ok(serde_json::to_value(result)?)
}
