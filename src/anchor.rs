//! Anchor resolution: turning a set of existing nodes into one insertion offset.
//!
//! Code generators append after the last entry of a list or prepend before the
//! first member of a class. Both need a single deterministic offset even when
//! the list is currently empty, which is what the fallback position is for.

use crate::change::{Change, ChangeError};
use crate::syntax::{by_position, find_nodes, Node, NodeQuery, SyntaxKind};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    #[error("tried to insert {content:?} with no anchor node and no fallback position")]
    NoAnchor { content: String },

    #[error(transparent)]
    Change(#[from] ChangeError),
}

/// How to derive an offset from the selected anchor node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    /// Look for the last/first node of this kind inside the selected anchor.
    pub drill: Option<SyntaxKind>,
    /// Added to the end (after-last) or subtracted from the start (before-first).
    pub offset: i64,
    /// Offset used when no anchor node exists.
    pub fallback: Option<i64>,
}

impl Placement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drill(mut self, kind: SyntaxKind) -> Self {
        self.drill = Some(kind);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn fallback(mut self, pos: i64) -> Self {
        self.fallback = Some(pos);
        self
    }
}

#[derive(Clone, Copy)]
enum Edge {
    Last,
    First,
}

fn drill_into<'t>(node: Node<'t>, kind: SyntaxKind, edge: Edge) -> Option<Node<'t>> {
    let mut matches = find_nodes(Some(node), &NodeQuery::new(kind));
    matches.sort_by(by_position);
    match edge {
        Edge::Last => matches.pop(),
        Edge::First => matches.into_iter().next(),
    }
}

fn resolve(
    nodes: &[Node<'_>],
    content: &str,
    placement: &Placement,
    edge: Edge,
) -> Result<i64, AnchorError> {
    let selected = match edge {
        Edge::Last => nodes.iter().copied().max_by_key(|n| n.start()),
        Edge::First => nodes.iter().copied().min_by_key(|n| n.start()),
    };
    let selected = match (selected, placement.drill) {
        (Some(node), Some(kind)) => drill_into(node, kind, edge),
        (selected, None) => selected,
        (None, Some(_)) => None,
    };

    let pos = match (selected, edge) {
        (Some(node), Edge::Last) => node.end() as i64 + placement.offset,
        (Some(node), Edge::First) => node.start() as i64 - placement.offset,
        (None, _) => placement.fallback.ok_or_else(|| AnchorError::NoAnchor {
            content: content.to_string(),
        })?,
    };

    debug!(
        anchor = ?selected,
        pos,
        fallback = selected.is_none(),
        "resolved anchor"
    );
    Ok(pos)
}

/// Offset just past the last of `nodes` (document order), adjusted by `placement`.
///
/// # Example
///
/// ```
/// use schematic_patcher::anchor::{insert_after_last, Placement};
///
/// // No existing nodes: the fallback wins.
/// assert_eq!(insert_after_last(&[], "x", &Placement::new().fallback(5)), Ok(5));
/// assert!(insert_after_last(&[], "x", &Placement::new()).is_err());
/// ```
pub fn insert_after_last(
    nodes: &[Node<'_>],
    content: &str,
    placement: &Placement,
) -> Result<i64, AnchorError> {
    resolve(nodes, content, placement, Edge::Last)
}

/// Offset at the start of the first of `nodes`, minus `placement.offset`.
pub fn insert_before_first(
    nodes: &[Node<'_>],
    content: &str,
    placement: &Placement,
) -> Result<i64, AnchorError> {
    resolve(nodes, content, placement, Edge::First)
}

/// Resolve an after-last anchor and build the insertion of `text` there.
pub fn after_last_change(
    path: impl Into<PathBuf>,
    nodes: &[Node<'_>],
    text: &str,
    placement: &Placement,
) -> Result<Change, AnchorError> {
    let pos = insert_after_last(nodes, text, placement)?;
    Ok(Change::insert(path, pos, text)?)
}

/// Resolve a before-first anchor and build the insertion of `text` there.
pub fn before_first_change(
    path: impl Into<PathBuf>,
    nodes: &[Node<'_>],
    text: &str,
    placement: &Placement,
) -> Result<Change, AnchorError> {
    let pos = insert_before_first(nodes, text, placement)?;
    Ok(Change::insert(path, pos, text)?)
}
