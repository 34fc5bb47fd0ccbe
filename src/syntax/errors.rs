use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("failed to set language for parser")]
    LanguageSet,

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("malformed syntax tree: {0}")]
    Tree(#[from] TreeError),

    #[error("syntax error detected at byte {byte_start}..{byte_end}")]
    SyntaxError { byte_start: usize, byte_end: usize },

    #[error("multiple syntax errors detected: {count} ERROR nodes")]
    MultipleSyntaxErrors { count: usize },
}

/// Violations of the node invariants, reported while a tree is assembled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node span is inverted: [{start}, {end})")]
    InvertedSpan { start: usize, end: usize },

    #[error("node ends at {end}, past the end of the {len}-byte source")]
    OutOfBounds { end: usize, len: usize },

    #[error("offset {offset} splits a UTF-8 character")]
    NotCharBoundary { offset: usize },

    #[error("child [{child_start}, {child_end}) is not contained in parent [{parent_start}, {parent_end})")]
    ChildOutsideParent {
        child_start: usize,
        child_end: usize,
        parent_start: usize,
        parent_end: usize,
    },

    #[error("sibling starting at {start} overlaps previous sibling ending at {previous_end}")]
    OverlappingSiblings { start: usize, previous_end: usize },

    #[error("finish_node called with no open node")]
    NoOpenNode,

    #[error("{open} node(s) left open")]
    Unbalanced { open: usize },

    #[error("tree has more than one root")]
    MultipleRoots,

    #[error("tree has no nodes")]
    Empty,
}
