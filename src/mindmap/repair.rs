//! Structural repair of drafted nodes into a well-formed tree.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use super::parse::DraftNode;
use super::types::{Node, NodeType, MAX_NODES};

/// Turn draft nodes into a single-rooted tree of at most four levels.
///
/// - The first root-typed node is the root; its parent is cleared.
/// - Other root-typed nodes, and main or untyped nodes with no parent, are
///   attached to the root.
/// - Nodes unreachable from the root (unknown parent, cycles) are dropped,
///   as are nodes deeper than the detail level.
/// - Types are reassigned from depth; at most [`MAX_NODES`] are kept in
///   breadth-first order. Output keeps generation order.
///
/// Returns an empty list when the draft has no root.
pub fn repair_tree(drafts: Vec<DraftNode>) -> Vec<Node> {
    let Some(root_index) = drafts.iter().position(|n| n.kind == Some(NodeType::Root)) else {
        return Vec::new();
    };
    let root_id = drafts[root_index].id.clone();

    let parents: Vec<Option<String>> = drafts
        .iter()
        .enumerate()
        .map(|(i, draft)| {
            if i == root_index {
                return None;
            }
            match (&draft.parent, draft.kind) {
                (_, Some(NodeType::Root)) => Some(root_id.clone()),
                (Some(parent), _) if *parent != draft.id => Some(parent.clone()),
                (None, None | Some(NodeType::Main)) => Some(root_id.clone()),
                _ => None,
            }
        })
        .collect();

    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, parent) in parents.iter().enumerate() {
        if let Some(parent) = parent {
            children.entry(parent.as_str()).or_default().push(i);
        }
    }

    let mut depth_of: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([(root_index, 0usize)]);
    let mut visited = HashSet::from([root_index]);

    while let Some((index, depth)) = queue.pop_front() {
        if depth_of.len() >= MAX_NODES {
            break;
        }
        depth_of.insert(index, depth);

        if NodeType::from_depth(depth + 1).is_none() {
            continue;
        }
        if let Some(kids) = children.get(drafts[index].id.as_str()) {
            for &kid in kids {
                if visited.insert(kid) {
                    queue.push_back((kid, depth + 1));
                }
            }
        }
    }

    let dropped = drafts.len() - depth_of.len();
    if dropped > 0 {
        warn!(
            dropped,
            kept = depth_of.len(),
            "Dropped nodes that did not fit the tree"
        );
    }

    drafts
        .into_iter()
        .zip(parents)
        .enumerate()
        .filter_map(|(i, (draft, parent))| {
            let depth = *depth_of.get(&i)?;
            let node_type = NodeType::from_depth(depth)?;
            if draft.kind != Some(node_type) {
                debug!(
                    node_id = %draft.id,
                    declared = ?draft.kind,
                    assigned = %node_type,
                    "Normalized node type from depth"
                );
            }
            Some(Node {
                id: draft.id,
                label: draft.label,
                node_type,
                parent,
                color: String::new(),
                position: None,
            })
        })
        .collect()
}
