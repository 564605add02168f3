//! The intent table.
//!
//! An ordered list of `(Intent, Regex)` pairs. The first pattern that
//! matches a query decides its intent, so specific phrasings must come
//! before general ones: "what are the main topics" has to be tried before
//! "what is X", and "how is X related to Y" before "related to X".

use super::types::VisualizationHint;
use regex::Regex;
use std::sync::LazyLock;

/// What a query is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Intent {
    MainTopics,
    Relationship,
    Path,
    TypeFilter,
    Importance,
    Neighbors,
    Similarity,
    Statistics,
    Communities,
    EntityInfo,
}

impl Intent {
    /// Rendering hint for results of this intent.
    #[must_use]
    pub fn hint(self) -> VisualizationHint {
        match self {
            Self::MainTopics => VisualizationHint::MainTopics,
            Self::Relationship => VisualizationHint::Relationship,
            Self::Path => VisualizationHint::Path,
            Self::TypeFilter => VisualizationHint::EntityType,
            Self::Importance => VisualizationHint::ImportantEntities,
            Self::Neighbors => VisualizationHint::Neighbors,
            Self::Similarity => VisualizationHint::Similar,
            Self::Statistics => VisualizationHint::Statistics,
            Self::Communities => VisualizationHint::Communities,
            Self::EntityInfo => VisualizationHint::EntityInfo,
        }
    }
}

/// A compiled pattern and the capture groups holding entity spans.
#[derive(Debug)]
pub struct Pattern {
    pub intent: Intent,
    pub regex: Regex,
    pub span_groups: &'static [usize],
}

const TABLE: &[(Intent, &str, &[usize])] = &[
    (
        Intent::MainTopics,
        r"what are the (main|key|important|top) (topics|concepts|entities)",
        &[],
    ),
    (
        Intent::Relationship,
        r"how (is|are) (.+?) (related|connected) to (.+)",
        &[2, 4],
    ),
    (
        Intent::Path,
        r"(shortest|best) (path|route|connection) (from|between) (.+?) (to|and) (.+)",
        &[4, 6],
    ),
    (
        Intent::TypeFilter,
        r"(find|show|list) all (.+?) (entities|concepts|topics)",
        &[2],
    ),
    (
        Intent::Importance,
        r"most (important|central|connected) (entities|nodes|concepts)",
        &[],
    ),
    (Intent::Neighbors, r"(neighbors|neighbours|connections) of (.+)", &[2]),
    (Intent::Similarity, r"(similar|related) to (.+)", &[2]),
    (
        Intent::Statistics,
        r"\b(statistics|stats|summary|overview)\b",
        &[],
    ),
    (
        Intent::Communities,
        r"\b(cluster|clusters|group|groups|community|communities)\b",
        &[],
    ),
    (Intent::EntityInfo, r"what (is|are) (.+)", &[2]),
];

static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    TABLE
        .iter()
        .map(|&(intent, source, span_groups)| Pattern {
            intent,
            regex: Regex::new(source).expect("intent pattern must compile"),
            span_groups,
        })
        .collect()
});

/// The intent table, in priority order.
#[must_use]
pub fn patterns() -> &'static [Pattern] {
    &PATTERNS
}

/// A classified query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMatch {
    pub intent: Intent,
    /// Cleaned entity spans, in pattern group order.
    pub spans: Vec<String>,
}

impl IntentMatch {
    /// The `n`th span, or `""` if the pattern captured fewer.
    #[must_use]
    pub fn span(&self, n: usize) -> &str {
        self.spans.get(n).map_or("", String::as_str)
    }
}

/// Normalize a query for matching: lowercase and trim.
#[must_use]
pub fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Strip whitespace, quotes and trailing punctuation from a captured span.
#[must_use]
pub fn clean_span(span: &str) -> String {
    span.trim()
        .trim_end_matches(['?', '!', '.'])
        .trim()
        .trim_matches(['"', '\''])
        .trim()
        .to_string()
}

/// Classify a query. `None` means no pattern matched.
#[must_use]
pub fn classify(query: &str) -> Option<IntentMatch> {
    let normalized = normalize(query);
    patterns().iter().find_map(|pattern| {
        pattern.regex.captures(&normalized).map(|caps| IntentMatch {
            intent: pattern.intent,
            spans: pattern
                .span_groups
                .iter()
                .map(|&g| caps.get(g).map(|m| clean_span(m.as_str())).unwrap_or_default())
                .collect(),
        })
    })
}
