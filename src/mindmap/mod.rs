//! Mind map generation.
//!
//! A request flows through the [`GraphBuilder`]: one backend call, lenient
//! parsing of whatever text comes back, structural repair into a single-rooted
//! tree, coloring, and the deterministic [`RadialLayout`]. When the backend
//! output cannot be trusted the keyword [`fallback`] graph is returned instead,
//! so a non-empty request always yields a valid map.
//!
//! [`MindMapMode`] wraps the builder with session handling and persistence
//! for the MCP tools.

mod builder;
mod fallback;
mod layout;
mod parse;
mod repair;
mod service;
mod types;
mod validate;

pub use builder::{
    compose_user_prompt, BuildOutcome, GraphBuilder, GraphSource, DEFAULT_SUGGESTIONS,
    MAX_HISTORY_ENTRIES,
};
pub use fallback::{
    extract_keywords, fallback, fallback_with, FALLBACK_SUGGESTIONS, MAX_FALLBACK_MAINS,
    MAX_KEYWORDS, PLACEHOLDER_LABEL,
};
pub use layout::{
    layout, LayoutAnomaly, LayoutResult, RadialLayout, CENTER, DETAIL_ARC, DETAIL_RADIUS,
    MAIN_RADIUS, START_ANGLE, SUB_ARC, SUB_RADIUS,
};
pub use parse::{
    extract_json_object, json_candidates, parse_generation, shorten_label,
    strip_trailing_commas, Draft, DraftNode,
};
pub use repair::repair_tree;
pub use service::{
    GetParams, LayoutParams, LayoutResponse, ListParams, MindMapMode, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT,
};
pub use types::{
    connections_from_parents, ColorScheme, Connection, MindMap, MindMapParams, MindMapResponse,
    Node, NodeType, Palette, Position, MAX_LABEL_WORDS, MAX_NODES,
};
pub use validate::{check_graph, check_invariants, check_tiers};
