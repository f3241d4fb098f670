//! Search and type-filter emphasis. Pure functions of the node list and the
//! current filter state; nothing here feeds back into the physics.

use std::collections::HashSet;
use std::convert::Infallible;
use std::str::FromStr;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::Serialize;

use crate::graph::{NodeType, SimNode};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    #[default]
    Normal,
    Dimmed,
    Highlighted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Case-insensitive substring match on the label.
    #[default]
    Substring,
    /// Skim-style fuzzy match on the label.
    Fuzzy,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TypeFilter {
    #[default]
    All,
    Only(NodeType),
}

impl TypeFilter {
    pub fn passes(&self, node_type: &NodeType) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == node_type,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            Ok(Self::Only(NodeType::from(value)))
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    pub search: String,
    pub search_mode: SearchMode,
    pub type_filter: TypeFilter,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || self.type_filter != TypeFilter::All
    }
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// A filter state prepared for classifying many nodes.
pub struct NodeFilter<'a> {
    state: &'a FilterState,
    query: String,
    matcher: Option<SkimMatcherV2>,
}

impl<'a> NodeFilter<'a> {
    pub fn new(state: &'a FilterState) -> Self {
        let query = state.search.trim();
        let matcher = match state.search_mode {
            SearchMode::Fuzzy if !query.is_empty() => Some(SkimMatcherV2::default()),
            _ => None,
        };
        Self {
            state,
            query: match state.search_mode {
                SearchMode::Substring => query.to_lowercase(),
                SearchMode::Fuzzy => query.to_owned(),
            },
            matcher,
        }
    }

    pub fn matches_search(&self, label: &str) -> bool {
        if self.query.is_empty() {
            return true;
        }
        match &self.matcher {
            Some(matcher) => fuzzy_match_score(matcher, label, &self.query).is_some(),
            None => label.to_lowercase().contains(&self.query),
        }
    }

    pub fn classify(&self, label: &str, node_type: &NodeType) -> Emphasis {
        if !self.state.type_filter.passes(node_type) {
            return Emphasis::Dimmed;
        }
        if self.query.is_empty() {
            return Emphasis::Normal;
        }
        if self.matches_search(label) {
            Emphasis::Highlighted
        } else {
            Emphasis::Dimmed
        }
    }
}

pub fn classify_nodes(nodes: &[SimNode], state: &FilterState) -> Vec<Emphasis> {
    if !state.is_active() {
        return vec![Emphasis::Normal; nodes.len()];
    }

    let filter = NodeFilter::new(state);
    nodes
        .iter()
        .map(|node| filter.classify(&node.label, &node.node_type))
        .collect()
}

/// Edges are drawn normally whatever their endpoints' emphasis.
pub fn edge_emphasis(_source: Emphasis, _target: Emphasis) -> Emphasis {
    Emphasis::Normal
}

/// Distinct node types in first-seen order, for filter menus.
pub fn node_types(nodes: &[SimNode]) -> Vec<NodeType> {
    let mut seen = HashSet::new();
    let mut types = Vec::new();
    for node in nodes {
        if seen.insert(&node.node_type) {
            types.push(node.node_type.clone());
        }
    }
    types
}
