//! Backend-free mind map built from the request's own keywords.

use chrono::Utc;

use super::layout::RadialLayout;
use super::types::{connections_from_parents, ColorScheme, MindMap, Node, NodeType};

/// Root label used when the input has no usable keywords.
pub const PLACEHOLDER_LABEL: &str = "Main Topic";

/// Keywords kept from the input.
pub const MAX_KEYWORDS: usize = 6;

/// Main nodes created under the root.
pub const MAX_FALLBACK_MAINS: usize = 4;

/// Words ignored when picking keywords. Tokens of three characters or fewer
/// are ignored regardless.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "with", "that", "this", "from",
    "have", "what", "about", "into", "your", "some", "want", "need", "please",
];

/// Generic next steps offered with every fallback graph.
pub const FALLBACK_SUGGESTIONS: [&str; 4] = [
    "Add more detail to your request to get deeper branches",
    "Ask to expand one of the main topics",
    "Describe your goal or audience to focus the map",
    "Try a shorter, more specific topic",
];

/// Keywords in input order, at most [`MAX_KEYWORDS`].
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| token.chars().count() > 3)
        .filter(|token| {
            let lower = token.to_lowercase();
            !STOP_WORDS.contains(&lower.as_str())
        })
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Build a valid graph from `text` alone.
///
/// Node labels are the keywords as written; only the title is capitalized.
pub fn fallback(text: &str, scheme: ColorScheme) -> MindMap {
    fallback_with(&RadialLayout::default(), text, scheme)
}

/// [`fallback`] with explicit layout parameters.
pub fn fallback_with(layout: &RadialLayout, text: &str, scheme: ColorScheme) -> MindMap {
    let keywords = extract_keywords(text);

    let root_label = keywords
        .first()
        .cloned()
        .unwrap_or_else(|| PLACEHOLDER_LABEL.to_string());

    let mut nodes = vec![Node::new("root", root_label.clone(), NodeType::Root)];
    nodes.extend(
        keywords
            .iter()
            .skip(1)
            .take(MAX_FALLBACK_MAINS)
            .enumerate()
            .map(|(i, keyword)| {
                Node::new(format!("main-{}", i + 1), keyword.as_str(), NodeType::Main)
                    .with_parent("root")
            }),
    );

    scheme.paint(&mut nodes);
    layout.apply(&mut nodes);
    let connections = connections_from_parents(&nodes);

    let title = if keywords.is_empty() {
        root_label
    } else {
        keywords
            .iter()
            .map(|k| capitalize(k))
            .collect::<Vec<_>>()
            .join(" ")
    };

    MindMap {
        title,
        nodes,
        connections,
        analysis: format!(
            "Built a starter map from the key terms in \"{}\". Ask again with more detail to grow each branch.",
            excerpt(text.trim(), 120)
        ),
        suggestions: FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        timestamp: Utc::now(),
        color_scheme: scheme,
        is_evolution: false,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// At most `max_chars` characters, with an ellipsis when cut.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
