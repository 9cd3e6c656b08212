use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::fallback::{excerpt, fallback_with};
use super::layout::RadialLayout;
use super::parse::{parse_generation, Draft};
use super::repair::repair_tree;
use super::types::{connections_from_parents, ColorScheme, MindMap, MindMapParams, NodeType};
use crate::config::GenerationConfig;
use crate::error::{InvalidInputError, UntrustedOutput};
use crate::langbase::CompletionBackend;
use crate::prompts::{
    EVOLUTION_INSTRUCTIONS, EXISTING_NODES_HEADER, HISTORY_HEADER, MINDMAP_SYSTEM_PROMPT,
};

/// History entries included in evolution prompts.
pub const MAX_HISTORY_ENTRIES: usize = 3;

/// Suggestions used when the backend returns none.
pub const DEFAULT_SUGGESTIONS: [&str; 3] = [
    "Expand a main branch into more detail",
    "Ask for examples under any sub topic",
    "Add constraints such as budget or timeline",
];

/// Where a built graph came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphSource {
    /// Backend output, parsed and repaired.
    Generated,
    /// Keyword fallback after the backend output was rejected.
    Fallback { reason: UntrustedOutput },
}

impl GraphSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, GraphSource::Fallback { .. })
    }
}

/// A built graph together with how it was produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub mind_map: MindMap,
    pub source: GraphSource,
}

/// Turns free-text requests into laid-out mind maps.
///
/// Makes a single backend call per build and never fails once the input is
/// non-empty: any problem with the backend or its output degrades to the
/// keyword fallback graph.
#[derive(Clone)]
pub struct GraphBuilder {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
    default_scheme: ColorScheme,
    layout: RadialLayout,
}

impl GraphBuilder {
    /// Create a builder over the given backend
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &GenerationConfig) -> Self {
        Self {
            backend,
            timeout: Duration::from_millis(config.timeout_ms),
            default_scheme: config.default_color_scheme,
            layout: RadialLayout::default(),
        }
    }

    /// Override the backend timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the layout parameters
    pub fn with_layout(mut self, layout: RadialLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Layout parameters used for every built graph
    pub fn layout(&self) -> &RadialLayout {
        &self.layout
    }

    /// Resolve the request's scheme name against this builder's default.
    pub fn resolve_scheme(&self, name: Option<&str>) -> ColorScheme {
        let requested = name.and_then(ColorScheme::from_name);
        requested.unwrap_or(self.default_scheme)
    }

    /// Build a mind map for the request.
    ///
    /// Only empty input is an error, and it is raised before any backend call.
    pub async fn build(&self, request: &MindMapParams) -> Result<MindMap, InvalidInputError> {
        Ok(self.build_with_source(request).await?.mind_map)
    }

    /// [`build`](Self::build), also reporting whether the fallback was used.
    pub async fn build_with_source(
        &self,
        request: &MindMapParams,
    ) -> Result<BuildOutcome, InvalidInputError> {
        let input = request.input.trim();
        if input.is_empty() {
            return Err(InvalidInputError::new("input", "Input cannot be empty"));
        }

        let scheme = self.resolve_scheme(request.color_scheme.as_deref());
        let prompt = compose_user_prompt(request, input, scheme);

        let outcome = match self.generate(&prompt).await {
            Ok(draft) => BuildOutcome {
                mind_map: self.assemble(draft, input, scheme, request.is_evolution),
                source: GraphSource::Generated,
            },
            Err(reason) => {
                warn!(
                    reason = %reason,
                    is_evolution = request.is_evolution,
                    "Generation output untrusted, using fallback graph"
                );
                let mut mind_map = fallback_with(&self.layout, input, scheme);
                mind_map.is_evolution = request.is_evolution;
                BuildOutcome {
                    mind_map,
                    source: GraphSource::Fallback { reason },
                }
            }
        };

        info!(
            nodes = outcome.mind_map.nodes.len(),
            fallback = outcome.source.is_fallback(),
            color_scheme = %scheme,
            "Mind map built"
        );

        Ok(outcome)
    }

    /// One bounded backend call, then parsing.
    async fn generate(&self, prompt: &str) -> Result<Draft, UntrustedOutput> {
        let call = self.backend.complete(MINDMAP_SYSTEM_PROMPT, prompt);

        let raw = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                return Err(UntrustedOutput::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => {
                return Err(UntrustedOutput::BackendFailed {
                    message: e.to_string(),
                })
            }
            Ok(Ok(raw)) => raw,
        };

        debug!(response_len = raw.len(), "Backend response received");
        parse_generation(&raw)
    }

    fn assemble(
        &self,
        draft: Draft,
        input: &str,
        scheme: ColorScheme,
        is_evolution: bool,
    ) -> MindMap {
        let mut nodes = repair_tree(draft.nodes);
        scheme.paint(&mut nodes);
        self.layout.apply(&mut nodes);
        let connections = connections_from_parents(&nodes);

        let root_label = nodes
            .iter()
            .find(|n| n.is_root())
            .map(|n| n.label.clone())
            .unwrap_or_default();
        let main_count = nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Main)
            .count();

        let suggestions = if draft.suggestions.is_empty() {
            DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
        } else {
            draft.suggestions
        };

        MindMap {
            title: draft.title.unwrap_or_else(|| root_label.clone()),
            analysis: draft.analysis.unwrap_or_else(|| {
                format!(
                    "Organized \"{}\" around {} with {} main branches.",
                    excerpt(input, 120),
                    root_label,
                    main_count
                )
            }),
            nodes,
            connections,
            suggestions,
            timestamp: Utc::now(),
            color_scheme: scheme,
            is_evolution,
        }
    }
}

/// User prompt for one build request.
///
/// Evolution requests also carry the existing nodes and the most recent
/// history entries, with instructions to extend rather than replace.
pub fn compose_user_prompt(request: &MindMapParams, input: &str, scheme: ColorScheme) -> String {
    let mut prompt = format!(
        "Create a mind map for: {}\n\nColor scheme: {}",
        input,
        scheme.as_str()
    );

    if !request.is_evolution {
        return prompt;
    }

    prompt.push_str("\n\n");
    prompt.push_str(EVOLUTION_INSTRUCTIONS);

    if !request.existing_nodes.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(EXISTING_NODES_HEADER);
        for node in &request.existing_nodes {
            let line = format!("\n- {} [{}] {}", node.id, node.node_type, node.label);
            prompt.push_str(&line);
            if let Some(parent) = &node.parent {
                prompt.push_str(&format!(" (parent: {})", parent));
            }
        }
    }

    let history = &request.conversation_history;
    if !history.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(HISTORY_HEADER);
        let skip = history.len().saturating_sub(MAX_HISTORY_ENTRIES);
        for entry in history.iter().skip(skip) {
            prompt.push_str(&format!("\n- {}", entry.trim()));
        }
    }

    prompt
}
