//! Generic tree queries.
//!
//! Every higher-level lookup ("the routes array", "the NgModule decorator",
//! "the first class member") is a composition of a kind filter and an
//! optional exact-text filter over these few traversals.

use crate::syntax::kind::SyntaxKind;
use crate::syntax::tree::{Node, SyntaxTree};
use std::cmp::Ordering;
use tracing::trace;

/// A single tree query: which kind to collect, optionally which exact text,
/// how many at most, and whether to keep descending into a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeQuery {
    pub kind: SyntaxKind,
    pub text: Option<String>,
    pub max: Option<usize>,
    pub recursive: bool,
}

impl NodeQuery {
    pub fn new(kind: SyntaxKind) -> Self {
        Self {
            kind,
            text: None,
            max: None,
            recursive: false,
        }
    }

    /// Only match nodes whose source text is exactly `text`.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// Keep looking inside matched nodes for further matches.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn matches(&self, node: &Node<'_>) -> bool {
        node.kind() == self.kind && self.text.as_deref().map_or(true, |text| node.text() == text)
    }
}

/// Find all nodes matching `query` in the subtree rooted at `root`.
///
/// Results are in document order. Without `recursive`, a match's own
/// children are not searched. The walk stops as soon as `max` matches have
/// been collected.
pub fn find_nodes<'t>(root: Option<Node<'t>>, query: &NodeQuery) -> Vec<Node<'t>> {
    let Some(root) = root else {
        return Vec::new();
    };
    let mut remaining = query.max.unwrap_or(usize::MAX);
    let mut found = Vec::new();
    if remaining == 0 {
        return found;
    }

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let matched = query.matches(&node);
        if matched {
            found.push(node);
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        if !matched || query.recursive {
            stack.extend(node.children().rev());
        }
    }

    trace!(kind = %query.kind, root = ?root, found = found.len(), "find_nodes");
    found
}

/// First node of `kind` (and exact `text`, if given) among `nodes`, searching
/// each candidate and then its children depth-first before moving on.
pub fn find_node<'t>(nodes: &[Node<'t>], kind: SyntaxKind, text: Option<&str>) -> Option<Node<'t>> {
    nodes.iter().find_map(|node| {
        node.descendants()
            .find(|n| n.kind() == kind && text.map_or(true, |text| n.text() == text))
    })
}

/// First identifier under `nodes` whose text is `name`.
pub fn find_by_identifier<'t>(nodes: &[Node<'t>], name: &str) -> Option<Node<'t>> {
    nodes
        .iter()
        .flat_map(|node| node.descendants())
        .filter(|n| n.kind() == SyntaxKind::Identifier)
        .find(|n| n.text() == name)
}

/// Every node in the tree in document order, optionally only those of `kind`.
pub fn source_nodes(tree: &SyntaxTree, kind: Option<SyntaxKind>) -> Vec<Node<'_>> {
    tree.root()
        .descendants()
        .filter(|n| kind.map_or(true, |kind| n.kind() == kind))
        .collect()
}

/// First node whose text equals `text`, or starts with it when `starts_with` is set.
pub fn find_element<'t>(tree: &'t SyntaxTree, text: &str, starts_with: bool) -> Option<Node<'t>> {
    tree.root().descendants().find(|n| {
        let node_text = n.text();
        node_text == text || (starts_with && node_text.starts_with(text))
    })
}

/// Ordering by start offset, for sorting query results.
pub fn by_position(first: &Node<'_>, second: &Node<'_>) -> Ordering {
    first.start().cmp(&second.start())
}
