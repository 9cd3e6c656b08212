//! Structural invariant checks for finished mind maps.

use std::collections::{HashMap, HashSet};

use super::types::{Connection, MindMap, Node, NodeType, MAX_NODES};
use crate::error::InvariantViolation;

/// Check a mind map against the graph invariants.
///
/// Verifies a non-empty, bounded node list with unique ids; exactly one
/// parentless root; every other node's parent resolving within the graph;
/// no cycles; and a one-to-one match between connections and parent links.
pub fn check_invariants(map: &MindMap) -> Result<(), InvariantViolation> {
    check_graph(&map.nodes, &map.connections)
}

/// Node/edge form of [`check_invariants`].
pub fn check_graph(nodes: &[Node], connections: &[Connection]) -> Result<(), InvariantViolation> {
    if nodes.is_empty() {
        return Err(InvariantViolation::Empty);
    }
    if nodes.len() > MAX_NODES {
        return Err(InvariantViolation::TooManyNodes {
            count: nodes.len(),
            limit: MAX_NODES,
        });
    }

    let mut by_id: HashMap<&str, &Node> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        if by_id.insert(node.id.as_str(), node).is_some() {
            return Err(InvariantViolation::DuplicateId {
                id: node.id.clone(),
            });
        }
    }

    let roots: Vec<&Node> = nodes.iter().filter(|n| n.is_root()).collect();
    match roots.as_slice() {
        [] => return Err(InvariantViolation::NoRoot),
        [root] => {
            if root.parent.is_some() {
                return Err(InvariantViolation::RootHasParent {
                    id: root.id.clone(),
                });
            }
        }
        many => {
            return Err(InvariantViolation::MultipleRoots { count: many.len() });
        }
    }

    for node in nodes.iter().filter(|n| !n.is_root()) {
        match node.parent.as_deref() {
            None => {
                return Err(InvariantViolation::MissingParent {
                    id: node.id.clone(),
                })
            }
            Some(parent) if !by_id.contains_key(parent) => {
                return Err(InvariantViolation::DanglingParent {
                    id: node.id.clone(),
                    parent: parent.to_string(),
                })
            }
            Some(_) => {}
        }
    }

    // Every parent resolves, so a walk that never reaches the root within
    // `nodes.len()` steps must be looping.
    for node in nodes {
        let mut current = node;
        let mut steps = 0;
        while let Some(parent) = current.parent.as_deref() {
            steps += 1;
            if steps > nodes.len() {
                return Err(InvariantViolation::Cycle {
                    id: node.id.clone(),
                });
            }
            current = by_id[parent];
        }
    }

    let links: HashSet<(&str, &str)> = nodes
        .iter()
        .filter_map(|n| n.parent.as_deref().map(|p| (p, n.id.as_str())))
        .collect();
    let mut matched = HashSet::with_capacity(links.len());
    for conn in connections {
        let key = (conn.from.as_str(), conn.to.as_str());
        if !links.contains(&key) || !matched.insert(key) {
            return Err(InvariantViolation::UnmatchedConnection {
                from: conn.from.clone(),
                to: conn.to.clone(),
            });
        }
    }
    if let Some((from, to)) = nodes
        .iter()
        .filter_map(|n| n.parent.as_deref().map(|p| (p, n.id.as_str())))
        .find(|link| !matched.contains(link))
    {
        return Err(InvariantViolation::MissingConnection {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    Ok(())
}

/// Check that every node whose parent is present sits exactly one tier below it.
///
/// Nodes with a missing parent are not checked here; layout reports them as anomalies.
pub fn check_tiers(nodes: &[Node]) -> Result<(), InvariantViolation> {
    let types: HashMap<&str, NodeType> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.node_type))
        .collect();

    for node in nodes {
        let Some(parent) = node.parent.as_deref() else {
            continue;
        };
        let Some(&parent_type) = types.get(parent) else {
            continue;
        };
        if parent_type.depth() + 1 != node.node_type.depth() {
            return Err(InvariantViolation::TierMismatch {
                id: node.id.clone(),
                node_type: node.node_type.to_string(),
                parent: parent.to_string(),
                parent_type: parent_type.to_string(),
            });
        }
    }
    Ok(())
}
