use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on nodes kept in one graph.
pub const MAX_NODES: usize = 40;

/// Labels longer than this many words are shortened.
pub const MAX_LABEL_WORDS: usize = 4;

/// Level of a node in the four-level hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// The single central node.
    Root,
    /// Direct children of the root.
    Main,
    /// Children of main nodes.
    Sub,
    /// Children of sub nodes.
    Detail,
}

impl NodeType {
    /// Get the type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Main => "main",
            NodeType::Sub => "sub",
            NodeType::Detail => "detail",
        }
    }

    /// Distance from the root in edges.
    pub fn depth(&self) -> usize {
        match self {
            NodeType::Root => 0,
            NodeType::Main => 1,
            NodeType::Sub => 2,
            NodeType::Detail => 3,
        }
    }

    /// Type for a node at the given tree depth, if the hierarchy allows it.
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            0 => Some(NodeType::Root),
            1 => Some(NodeType::Main),
            2 => Some(NodeType::Sub),
            3 => Some(NodeType::Detail),
            _ => None,
        }
    }

    /// Lenient match used on generated output, which is loose with naming.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "root" | "central" | "center" | "centre" => Some(NodeType::Root),
            "main" | "primary" | "branch" | "topic" => Some(NodeType::Main),
            "sub" | "secondary" | "subtopic" | "sub-topic" | "subbranch" => Some(NodeType::Sub),
            "detail" | "details" | "tertiary" | "leaf" => Some(NodeType::Detail),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "root" => Ok(NodeType::Root),
            "main" => Ok(NodeType::Main),
            "sub" => Ok(NodeType::Sub),
            "detail" => Ok(NodeType::Detail),
            _ => Err(format!("Unknown node type: {}", s)),
        }
    }
}

/// Colors for each node level within one scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub root: &'static str,
    pub main: &'static str,
    pub sub: &'static str,
    pub detail: &'static str,
}

/// Named color schemes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorScheme {
    #[default]
    Purple,
    FortuneRed,
    CalmGreen,
    PineGreen,
    AuthenticBlue,
    SugarBrown,
}

impl ColorScheme {
    /// Every scheme, default first.
    pub const ALL: [ColorScheme; 6] = [
        ColorScheme::Purple,
        ColorScheme::FortuneRed,
        ColorScheme::CalmGreen,
        ColorScheme::PineGreen,
        ColorScheme::AuthenticBlue,
        ColorScheme::SugarBrown,
    ];

    /// Get the scheme name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorScheme::Purple => "purple",
            ColorScheme::FortuneRed => "fortuneRed",
            ColorScheme::CalmGreen => "calmGreen",
            ColorScheme::PineGreen => "pineGreen",
            ColorScheme::AuthenticBlue => "authenticBlue",
            ColorScheme::SugarBrown => "sugarBrown",
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            ColorScheme::Purple => Palette {
                root: "#6B46C1",
                main: "#8B5CF6",
                sub: "#A78BFA",
                detail: "#DDD6FE",
            },
            ColorScheme::FortuneRed => Palette {
                root: "#991B1B",
                main: "#DC2626",
                sub: "#F87171",
                detail: "#FECACA",
            },
            ColorScheme::CalmGreen => Palette {
                root: "#047857",
                main: "#10B981",
                sub: "#6EE7B7",
                detail: "#D1FAE5",
            },
            ColorScheme::PineGreen => Palette {
                root: "#14532D",
                main: "#166534",
                sub: "#22C55E",
                detail: "#BBF7D0",
            },
            ColorScheme::AuthenticBlue => Palette {
                root: "#1E3A8A",
                main: "#2563EB",
                sub: "#60A5FA",
                detail: "#BFDBFE",
            },
            ColorScheme::SugarBrown => Palette {
                root: "#78350F",
                main: "#B45309",
                sub: "#D97706",
                detail: "#FDE68A",
            },
        }
    }

    /// Color for a node of the given type.
    pub fn color_for(&self, node_type: NodeType) -> &'static str {
        let palette = self.palette();
        match node_type {
            NodeType::Root => palette.root,
            NodeType::Main => palette.main,
            NodeType::Sub => palette.sub,
            NodeType::Detail => palette.detail,
        }
    }

    /// Match a scheme name, ignoring case and `-`/`_`/space separators.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();

        Self::ALL
            .into_iter()
            .find(|scheme| scheme.as_str().to_lowercase() == normalized)
    }

    /// Resolve an optional name, silently falling back to the default scheme.
    pub fn from_name_or_default(name: Option<&str>) -> Self {
        name.and_then(Self::from_name).unwrap_or_default()
    }

    /// Overwrite every node's color from its type.
    pub fn paint(&self, nodes: &mut [Node]) {
        for node in nodes {
            node.color = self.color_for(node.node_type).to_string();
        }
    }
}

impl std::fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 2-D coordinate assigned by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point at `radius` from `self` in direction `angle` (radians).
    pub fn offset(&self, angle: f64, radius: f64) -> Self {
        Self {
            x: self.x + radius * angle.cos(),
            y: self.y + radius * angle.sin(),
        }
    }

    /// Direction from `origin` to `self` in radians.
    pub fn angle_from(&self, origin: Position) -> f64 {
        (self.y - origin.y).atan2(self.x - origin.x)
    }
}

/// A single concept in the mind map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier within the graph.
    pub id: String,
    /// Short display text.
    #[serde(alias = "text")]
    pub label: String,
    /// Hierarchy level.
    #[serde(rename = "type", alias = "category")]
    pub node_type: NodeType,
    /// Parent node id; absent only for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Display color derived from type and scheme.
    #[serde(default)]
    pub color: String,
    /// Coordinates computed by the layout engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    /// Create a node with no parent, color, or position
    pub fn new(id: impl Into<String>, label: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            parent: None,
            color: String::new(),
            position: None,
        }
    }

    /// Set the parent node id
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.node_type == NodeType::Root
    }
}

/// Directed parent-to-child edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    #[serde(alias = "source")]
    pub from: String,
    #[serde(alias = "target")]
    pub to: String,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Edges mirroring every node's parent link, in node order.
pub fn connections_from_parents(nodes: &[Node]) -> Vec<Connection> {
    nodes
        .iter()
        .filter_map(|node| {
            node.parent
                .as_ref()
                .map(|parent| Connection::new(parent.clone(), node.id.clone()))
        })
        .collect()
}

/// A complete mind map graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMap {
    pub title: String,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub color_scheme: ColorScheme,
    #[serde(default)]
    pub is_evolution: bool,
}

impl MindMap {
    /// The root node, if present.
    pub fn root(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_root())
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes of one type, in generation order.
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }
}

/// Input parameters for mind map generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapParams {
    /// Free-text request; must be non-empty after trimming.
    #[serde(default)]
    pub input: String,
    /// Session grouping stored maps (creates new if not provided)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Extend an existing map instead of starting fresh.
    #[serde(default)]
    pub is_evolution: bool,
    /// Color scheme name; unknown names fall back to the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
    /// Nodes of the map being evolved.
    #[serde(default)]
    pub existing_nodes: Vec<Node>,
    /// Prior prompts, most recent last.
    #[serde(default)]
    pub conversation_history: Vec<String>,
}

impl MindMapParams {
    /// Create new params with just the input text
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Set the session ID
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the color scheme name
    pub fn with_color_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.color_scheme = Some(scheme.into());
        self
    }

    /// Mark as an evolution of the given nodes
    pub fn evolving(mut self, existing_nodes: Vec<Node>) -> Self {
        self.is_evolution = true;
        self.existing_nodes = existing_nodes;
        self
    }

    /// Set the conversation history
    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.conversation_history = history;
        self
    }
}

/// Caller-facing result of a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapResponse {
    /// True whenever a graph is returned, including fallback graphs.
    pub success: bool,
    pub mind_map: MindMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mind_map_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}
