//! Lenient reading of generation output.
//!
//! The backend is asked for bare JSON but regularly wraps it in prose or
//! code fences, leaves trailing commas, or drifts from the requested field
//! names. Everything here is best-effort: output that still cannot be read
//! is reported as [`UntrustedOutput`] so the caller can fall back.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use super::types::{NodeType, MAX_LABEL_WORDS};
use crate::error::UntrustedOutput;

/// A node as read from generation output, before structural repair.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftNode {
    pub id: String,
    pub label: String,
    /// Declared type; `None` when absent or unrecognized.
    pub kind: Option<NodeType>,
    pub parent: Option<String>,
}

/// Generation output after parsing, before repair and layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub title: Option<String>,
    pub nodes: Vec<DraftNode>,
    pub analysis: Option<String>,
    pub suggestions: Vec<String>,
}

/// Parse raw backend text into a draft graph.
///
/// Fails when no JSON object can be recovered, when it has no usable
/// `nodes`, or when no node is declared as the root.
pub fn parse_generation(raw: &str) -> Result<Draft, UntrustedOutput> {
    if raw.trim().is_empty() {
        return Err(UntrustedOutput::EmptyResponse);
    }

    let object = parse_object(raw)?;
    let object = unwrap_envelope(&object);

    let raw_nodes = object
        .get("nodes")
        .and_then(Value::as_array)
        .filter(|nodes| !nodes.is_empty())
        .ok_or(UntrustedOutput::MissingNodes)?;

    let mut nodes = read_nodes(raw_nodes);
    if nodes.is_empty() {
        return Err(UntrustedOutput::MissingNodes);
    }

    let connections = object
        .get("connections")
        .or_else(|| object.get("edges"))
        .and_then(Value::as_array)
        .map(|edges| read_connections(edges))
        .unwrap_or_default();
    recover_parents(&mut nodes, &connections);

    if !nodes.iter().any(|n| n.kind == Some(NodeType::Root)) {
        return Err(UntrustedOutput::MissingRoot);
    }

    Ok(Draft {
        title: string_field(object, &["title"]),
        nodes,
        analysis: string_field(object, &["analysis", "summary"]),
        suggestions: object
            .get("suggestions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

/// Recover the outermost JSON object from text that may contain other prose.
fn parse_object(raw: &str) -> Result<Map<String, Value>, UntrustedOutput> {
    let candidates = json_candidates(raw);
    if candidates.is_empty() {
        return Err(UntrustedOutput::NoJsonObject);
    }

    let mut last_error = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(&strip_trailing_commas(candidate)) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => last_error = Some("top-level value is not an object".to_string()),
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    Err(UntrustedOutput::Malformed {
        message: last_error.unwrap_or_else(|| "unparseable".to_string()),
    })
}

/// Substrings worth trying as JSON, most likely first.
///
/// Order: the whole trimmed text when it is a bare object, a fenced code
/// block, the span from the first `{` to the last `}`, then every balanced
/// top-level `{...}` span from largest to smallest.
pub fn json_candidates(raw: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let trimmed = raw.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        candidates.push(trimmed);
    }

    if let Some(block) = fenced_block(raw) {
        if block.starts_with('{') {
            candidates.push(block);
        }
    }

    if let Some(span) = extract_json_object(raw) {
        candidates.push(span);
    }

    let mut balanced = balanced_objects(raw);
    balanced.sort_by_key(|span| std::cmp::Reverse(span.len()));
    candidates.extend(balanced);

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(*c));
    candidates
}

/// The largest `{...}` span: first opening brace to last closing brace.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Contents of the first ```json or ``` fenced block.
fn fenced_block(raw: &str) -> Option<&str> {
    let after = if let Some((_, rest)) = raw.split_once("```json") {
        rest
    } else {
        raw.split_once("```")?.1
    };
    after
        .split("```")
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Balanced top-level `{...}` spans, skipping braces inside string literals.
fn balanced_objects(raw: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&raw[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    spans
}

/// Remove commas that directly precede `}` or `]`, outside string literals.
pub fn strip_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Some models wrap the graph as `{"mindMap": {...}}`.
fn unwrap_envelope(object: &Map<String, Value>) -> &Map<String, Value> {
    if object.contains_key("nodes") {
        return object;
    }
    ["mindMap", "mind_map", "mindmap", "graph"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_object))
        .filter(|inner| inner.contains_key("nodes"))
        .unwrap_or(object)
}

fn read_nodes(raw_nodes: &[Value]) -> Vec<DraftNode> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::with_capacity(raw_nodes.len());

    for (index, value) in raw_nodes.iter().enumerate() {
        let Some(obj) = value.as_object() else {
            debug!(index, "Skipping non-object node");
            continue;
        };

        let id = id_field(obj, &["id"]).unwrap_or_else(|| format!("node-{}", index + 1));
        if !seen.insert(id.clone()) {
            debug!(node_id = %id, "Skipping duplicate node id");
            continue;
        }

        let label = string_field(obj, &["label", "text", "name", "title"])
            .map(|label| shorten_label(&label))
            .unwrap_or_else(|| id.clone());

        let kind = string_field(obj, &["type", "category", "level"])
            .and_then(|kind| NodeType::parse_lenient(&kind));

        let parent = id_field(obj, &["parent", "parentId", "parent_id"]);

        nodes.push(DraftNode {
            id,
            label,
            kind,
            parent,
        });
    }

    nodes
}

fn read_connections(edges: &[Value]) -> Vec<(String, String)> {
    edges
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|edge| {
            let from = id_field(edge, &["from", "source"])?;
            let to = id_field(edge, &["to", "target"])?;
            Some((from, to))
        })
        .collect()
}

/// Fill missing non-root parents from a connection pointing at the node.
fn recover_parents(nodes: &mut [DraftNode], connections: &[(String, String)]) {
    for node in nodes.iter_mut() {
        if node.parent.is_some() || node.kind == Some(NodeType::Root) {
            continue;
        }
        if let Some((from, _)) = connections
            .iter()
            .find(|(from, to)| *to == node.id && *from != node.id)
        {
            node.parent = Some(from.clone());
        }
    }
}

/// First non-empty string among `keys`.
fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// First non-empty id among `keys`; numeric ids are accepted.
fn id_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Keep at most [`MAX_LABEL_WORDS`] words.
pub fn shorten_label(label: &str) -> String {
    label
        .split_whitespace()
        .take(MAX_LABEL_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}
