//! Immutable syntax tree snapshots.
//!
//! A [`SyntaxTree`] owns the text it was built from plus an arena of node
//! records. [`Node`] is a cheap `Copy` handle that borrows the tree, so node
//! offsets can never be used against a different text: once a document is
//! edited, the old tree has to be dropped and the new text parsed again.

use crate::syntax::errors::TreeError;
use crate::syntax::kind::SyntaxKind;
use std::fmt;
use std::ops::Range;

/// Index of a node inside its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: SyntaxKind,
    grammar_kind: &'static str,
    start: usize,
    end: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed source file: its text and the node arena built over it.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: String,
    nodes: Vec<NodeData>,
}

impl SyntaxTree {
    /// The text this tree's offsets index into.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: NodeId(0),
        }
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<Node<'_>> {
        (id.index() < self.nodes.len()).then_some(Node { tree: self, id })
    }

    /// Check if the tree contains any error-recovery nodes.
    pub fn has_errors(&self) -> bool {
        self.nodes.iter().any(|n| n.kind == SyntaxKind::Error)
    }

    /// Get all error-recovery nodes, in document order.
    pub fn error_nodes(&self) -> Vec<Node<'_>> {
        self.root()
            .descendants()
            .filter(|n| n.kind() == SyntaxKind::Error)
            .collect()
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

/// Handle to one node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    pub fn kind(&self) -> SyntaxKind {
        self.tree.data(self.id).kind
    }

    /// The grammar's own name for this node (e.g. `variable_declarator`).
    pub fn grammar_kind(&self) -> &'static str {
        self.tree.data(self.id).grammar_kind
    }

    pub fn start(&self) -> usize {
        self.tree.data(self.id).start
    }

    pub fn end(&self) -> usize {
        self.tree.data(self.id).end
    }

    pub fn span(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Raw source slice covered by this node.
    pub fn text(&self) -> &'t str {
        &self.tree.source[self.span()]
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.tree.data(self.id).parent.map(|id| Node {
            tree: self.tree,
            id,
        })
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = Node<'t>> + ExactSizeIterator + 't {
        let tree = self.tree;
        tree.data(self.id)
            .children
            .iter()
            .map(move |&id| Node { tree, id })
    }

    pub fn child_count(&self) -> usize {
        self.tree.data(self.id).children.len()
    }

    /// This node and everything below it, in pre-order (document order).
    pub fn descendants(&self) -> Descendants<'t> {
        Descendants {
            tree: self.tree,
            stack: vec![self.id],
        }
    }

    /// Nearest ancestor (excluding self) of the given kind.
    pub fn ancestor(&self, kind: SyntaxKind) -> Option<Node<'t>> {
        let mut current = self.parent();
        while let Some(node) = current {
            if node.kind() == kind {
                return Some(node);
            }
            current = node.parent();
        }
        None
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}..{}", self.kind(), self.start(), self.end())
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'t> {
    tree: &'t SyntaxTree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Descendants<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.data(id).children.iter().rev().copied());
        Some(Node {
            tree: self.tree,
            id,
        })
    }
}

/// Assembles a [`SyntaxTree`] in pre-order, checking node invariants as
/// nodes are opened and closed.
///
/// ```
/// use schematic_patcher::syntax::{SyntaxKind, TreeBuilder};
///
/// let mut builder = TreeBuilder::new("[1, 2]");
/// builder.start_node(SyntaxKind::ArrayLiteral, 0).unwrap();
/// builder.leaf(SyntaxKind::Other, 1, 2).unwrap();
/// builder.leaf(SyntaxKind::Other, 4, 5).unwrap();
/// builder.finish_node(6).unwrap();
/// let tree = builder.build().unwrap();
/// assert_eq!(tree.root().children().count(), 2);
/// ```
pub struct TreeBuilder {
    source: String,
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            nodes: Vec::new(),
            open: Vec::new(),
        }
    }

    /// Open a node whose grammar name is the kind's own name.
    pub fn start_node(&mut self, kind: SyntaxKind, start: usize) -> Result<NodeId, TreeError> {
        self.start_grammar_node(kind, kind.as_str(), start)
    }

    pub fn start_grammar_node(
        &mut self,
        kind: SyntaxKind,
        grammar_kind: &'static str,
        start: usize,
    ) -> Result<NodeId, TreeError> {
        if start > self.source.len() {
            return Err(TreeError::OutOfBounds {
                end: start,
                len: self.source.len(),
            });
        }
        if !self.source.is_char_boundary(start) {
            return Err(TreeError::NotCharBoundary { offset: start });
        }

        let parent = self.open.last().copied();
        match parent {
            Some(parent_id) => {
                let parent_data = &self.nodes[parent_id.index()];
                if start < parent_data.start {
                    return Err(TreeError::ChildOutsideParent {
                        child_start: start,
                        child_end: start,
                        parent_start: parent_data.start,
                        parent_end: parent_data.end,
                    });
                }
                if let Some(&previous) = parent_data.children.last() {
                    let previous_end = self.nodes[previous.index()].end;
                    if start < previous_end {
                        return Err(TreeError::OverlappingSiblings {
                            start,
                            previous_end,
                        });
                    }
                }
            }
            None if !self.nodes.is_empty() => return Err(TreeError::MultipleRoots),
            None => {}
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            grammar_kind,
            start,
            end: start,
            parent,
            children: Vec::new(),
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.index()].children.push(id);
        }
        self.open.push(id);
        Ok(id)
    }

    /// Close the most recently opened node at `end`.
    pub fn finish_node(&mut self, end: usize) -> Result<NodeId, TreeError> {
        let id = self.open.pop().ok_or(TreeError::NoOpenNode)?;
        let data = &self.nodes[id.index()];

        if end < data.start {
            return Err(TreeError::InvertedSpan {
                start: data.start,
                end,
            });
        }
        if end > self.source.len() {
            return Err(TreeError::OutOfBounds {
                end,
                len: self.source.len(),
            });
        }
        if !self.source.is_char_boundary(end) {
            return Err(TreeError::NotCharBoundary { offset: end });
        }
        // Children are ascending and disjoint, so only the last one can poke out.
        if let Some(&last) = data.children.last() {
            let child = &self.nodes[last.index()];
            if child.end > end {
                return Err(TreeError::ChildOutsideParent {
                    child_start: child.start,
                    child_end: child.end,
                    parent_start: data.start,
                    parent_end: end,
                });
            }
        }

        self.nodes[id.index()].end = end;
        Ok(id)
    }

    /// Open and immediately close a childless node.
    pub fn leaf(&mut self, kind: SyntaxKind, start: usize, end: usize) -> Result<NodeId, TreeError> {
        self.start_node(kind, start)?;
        self.finish_node(end)
    }

    pub fn build(self) -> Result<SyntaxTree, TreeError> {
        if !self.open.is_empty() {
            return Err(TreeError::Unbalanced {
                open: self.open.len(),
            });
        }
        if self.nodes.is_empty() {
            return Err(TreeError::Empty);
        }
        Ok(SyntaxTree {
            source: self.source,
            nodes: self.nodes,
        })
    }
}
