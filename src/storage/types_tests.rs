//! Unit tests for storage types and builder patterns.

use super::*;
use crate::mindmap::{fallback, ColorScheme};
use serde_json::json;

// ============================================================================
// Session tests
// ============================================================================

#[test]
fn test_session_new() {
    let session = Session::new();
    assert!(!session.id.is_empty());
    assert_eq!(session.created_at, session.updated_at);
    assert!(session.metadata.is_none());
}

#[test]
fn test_session_with_id_and_metadata() {
    let session = Session::with_id("sess-1").with_metadata(json!({"source": "cli"}));
    assert_eq!(session.id, "sess-1");
    assert_eq!(session.metadata, Some(json!({"source": "cli"})));
}

#[test]
fn test_session_touch() {
    let mut session = Session::new();
    let before = session.updated_at;
    std::thread::sleep(std::time::Duration::from_millis(2));
    session.touch();
    assert!(session.updated_at > before);
    assert_eq!(session.created_at, before);
}

// ============================================================================
// MindMapRecord tests
// ============================================================================

#[test]
fn test_mind_map_record_new() {
    let map = fallback("plan a product launch", ColorScheme::Purple);
    let record = MindMapRecord::new("sess-1", "plan a product launch", map);

    assert!(!record.id.is_empty());
    assert_eq!(record.session_id, "sess-1");
    assert_eq!(record.title, "Plan Product Launch");
    assert!(!record.used_fallback);

    let record = record.with_fallback(true);
    assert!(record.used_fallback);
}

#[test]
fn test_mind_map_summary() {
    let map = fallback("plan a product launch", ColorScheme::Purple);
    let record = MindMapRecord::new("sess-1", "plan a product launch", map).with_fallback(true);
    let summary = record.summary();

    assert_eq!(summary.id, record.id);
    assert_eq!(summary.node_count, 3);
    assert!(summary.used_fallback);

    let value = serde_json::to_value(&summary).unwrap();
    assert_eq!(value["nodeCount"], 3);
    assert_eq!(value["usedFallback"], true);
}

// ============================================================================
// Invocation tests
// ============================================================================

#[test]
fn test_invocation_new() {
    let inv = Invocation::new("mindmap_generate", json!({"input": "x"}));
    assert!(!inv.id.is_empty());
    assert_eq!(inv.tool_name, "mindmap_generate");
    assert!(inv.success);
    assert!(!inv.fallback_used);
    assert!(inv.session_id.is_none());
    assert!(inv.pipe_name.is_none());
}

#[test]
fn test_invocation_builders() {
    let inv = Invocation::new("mindmap_generate", json!({}))
        .with_session("sess-1")
        .with_pipe("mindmap-generator-v1")
        .success(json!({"ok": true}), 42)
        .with_fallback("timeout");

    assert_eq!(inv.session_id.as_deref(), Some("sess-1"));
    assert_eq!(inv.pipe_name.as_deref(), Some("mindmap-generator-v1"));
    assert_eq!(inv.latency_ms, Some(42));
    assert!(inv.success);
    assert!(inv.fallback_used);
    assert_eq!(inv.error.as_deref(), Some("timeout"));
}

#[test]
fn test_invocation_failure() {
    let inv = Invocation::new("mindmap_get", json!({})).failure("not found", 3);
    assert!(!inv.success);
    assert_eq!(inv.error.as_deref(), Some("not found"));
    assert!(inv.output.is_none());
}
