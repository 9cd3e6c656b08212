//! Radial layout for the four-level node hierarchy.
//!
//! The root sits at a fixed center. Main nodes are spread evenly on a circle
//! around it, starting at 12 o'clock and going clockwise in generation order.
//! Each parent's children are fanned across a fixed arc that points away from
//! the center, so siblings never overlap. Overlaps between unrelated subtrees
//! are possible and accepted.
//!
//! The computation is a single pass per tier with no randomness: the same
//! node list always yields bit-identical coordinates.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_3, PI};

use serde::Serialize;
use tracing::warn;

use super::types::{Node, NodeType, Position};

/// Center point where the root is placed.
pub const CENTER: Position = Position::new(400.0, 300.0);
/// Distance of main nodes from the center.
pub const MAIN_RADIUS: f64 = 220.0;
/// Distance of sub nodes from their main parent.
pub const SUB_RADIUS: f64 = 140.0;
/// Distance of detail nodes from their sub parent.
pub const DETAIL_RADIUS: f64 = 90.0;
/// Arc spanned by a group of sub nodes (60 degrees).
pub const SUB_ARC: f64 = FRAC_PI_3;
/// Arc spanned by a group of detail nodes (90 degrees).
pub const DETAIL_ARC: f64 = FRAC_PI_2;
/// Angle of the first main node (12 o'clock).
pub const START_ANGLE: f64 = -FRAC_PI_2;

/// A node that could not be placed because its parent had no position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutAnomaly {
    pub node_id: String,
    pub parent: Option<String>,
}

/// Positions keyed by node id, plus any nodes left unplaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutResult {
    pub positions: BTreeMap<String, Position>,
    pub anomalies: Vec<LayoutAnomaly>,
}

/// Where a placed node sits and which way it faces from the center.
#[derive(Debug, Clone, Copy)]
struct Placement {
    position: Position,
    angle: f64,
}

/// Radial layout parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialLayout {
    pub center: Position,
    pub main_radius: f64,
    pub sub_radius: f64,
    pub detail_radius: f64,
    pub sub_arc: f64,
    pub detail_arc: f64,
}

impl Default for RadialLayout {
    fn default() -> Self {
        Self {
            center: CENTER,
            main_radius: MAIN_RADIUS,
            sub_radius: SUB_RADIUS,
            detail_radius: DETAIL_RADIUS,
            sub_arc: SUB_ARC,
            detail_arc: DETAIL_ARC,
        }
    }
}

impl RadialLayout {
    /// Compute positions for every placeable node.
    ///
    /// Nodes are processed tier by tier (root, main, sub, detail). A node
    /// whose parent has not been placed by the previous tier is skipped and
    /// reported as an anomaly; the rest of the layout continues.
    pub fn compute(&self, nodes: &[Node]) -> LayoutResult {
        let mut result = LayoutResult::default();

        let Some(root) = nodes.iter().find(|n| n.is_root()) else {
            return result;
        };
        result.positions.insert(root.id.clone(), self.center);

        // Additional root-typed nodes have no slot in the hierarchy.
        for extra in nodes
            .iter()
            .filter(|n| n.is_root() && !std::ptr::eq(*n, root))
        {
            record_anomaly(&mut result, extra);
        }

        let mains = self.place_mains(nodes, root, &mut result);
        let subs = self.fan_out(
            nodes,
            NodeType::Sub,
            &mains,
            self.sub_radius,
            self.sub_arc,
            &mut result,
        );
        self.fan_out(
            nodes,
            NodeType::Detail,
            &subs,
            self.detail_radius,
            self.detail_arc,
            &mut result,
        );

        result
    }

    /// Compute and write positions onto the nodes.
    ///
    /// Any existing position is overwritten; unplaced nodes end up with none.
    pub fn apply(&self, nodes: &mut [Node]) -> Vec<LayoutAnomaly> {
        let LayoutResult {
            positions,
            anomalies,
        } = self.compute(nodes);

        for node in nodes.iter_mut() {
            node.position = positions.get(&node.id).copied();
        }

        anomalies
    }

    fn place_mains<'a>(
        &self,
        nodes: &'a [Node],
        root: &Node,
        result: &mut LayoutResult,
    ) -> HashMap<&'a str, Placement> {
        let mut mains = Vec::new();
        for node in nodes.iter().filter(|n| n.node_type == NodeType::Main) {
            if node.parent.as_deref() == Some(root.id.as_str()) {
                mains.push(node);
            } else {
                record_anomaly(result, node);
            }
        }

        let count = mains.len() as f64;
        let mut placed = HashMap::with_capacity(mains.len());
        for (i, node) in mains.into_iter().enumerate() {
            let angle = START_ANGLE + 2.0 * PI * i as f64 / count;
            let position = self.center.offset(angle, self.main_radius);
            result.positions.insert(node.id.clone(), position);
            placed.insert(node.id.as_str(), Placement { position, angle });
        }

        placed
    }

    fn fan_out<'a>(
        &self,
        nodes: &'a [Node],
        node_type: NodeType,
        parents: &HashMap<&str, Placement>,
        radius: f64,
        arc: f64,
        result: &mut LayoutResult,
    ) -> HashMap<&'a str, Placement> {
        // Group by parent, keeping first-appearance order of parents and
        // generation order within each group.
        let mut groups: Vec<(Placement, Vec<&'a Node>)> = Vec::new();
        let mut group_index: HashMap<&str, usize> = HashMap::new();

        for node in nodes.iter().filter(|n| n.node_type == node_type) {
            let parent = node
                .parent
                .as_deref()
                .and_then(|id| parents.get(id).map(|placement| (id, *placement)));

            match parent {
                Some((parent_id, placement)) => {
                    let index = *group_index.entry(parent_id).or_insert_with(|| {
                        groups.push((placement, Vec::new()));
                        groups.len() - 1
                    });
                    groups[index].1.push(node);
                }
                None => record_anomaly(result, node),
            }
        }

        let mut placed = HashMap::new();
        for (parent, children) in groups {
            let k = children.len();
            for (j, node) in children.into_iter().enumerate() {
                let angle = if k > 1 {
                    parent.angle - arc / 2.0 + j as f64 * arc / (k - 1) as f64
                } else {
                    parent.angle
                };
                let position = parent.position.offset(angle, radius);
                result.positions.insert(node.id.clone(), position);
                placed.insert(
                    node.id.as_str(),
                    Placement {
                        position,
                        angle: position.angle_from(self.center),
                    },
                );
            }
        }

        placed
    }
}

fn record_anomaly(result: &mut LayoutResult, node: &Node) {
    warn!(
        node_id = %node.id,
        parent = ?node.parent,
        node_type = %node.node_type,
        "Layout anomaly: no positioned parent on the preceding tier, node left unplaced"
    );
    result.anomalies.push(LayoutAnomaly {
        node_id: node.id.clone(),
        parent: node.parent.clone(),
    });
}

/// Lay out nodes with the default parameters.
pub fn layout(nodes: &[Node]) -> BTreeMap<String, Position> {
    RadialLayout::default().compute(nodes).positions
}
