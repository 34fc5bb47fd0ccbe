//! Syntax trees for TypeScript sources.
//!
//! Source text is parsed with tree-sitter, lowered into an immutable
//! [`SyntaxTree`] tagged with the closed [`SyntaxKind`] set, and queried with
//! the primitives in [`query`]. Offsets are byte offsets into the text the
//! tree was built from.

pub mod errors;
pub mod kind;
pub mod parser;
pub mod query;
pub mod tree;
pub mod validator;

pub use errors::{SyntaxError, TreeError};
pub use kind::{SyntaxKind, UnknownKind};
pub use parser::{Dialect, SourceParser, TypeScriptParser};
pub use query::{
    by_position, find_by_identifier, find_element, find_node, find_nodes, source_nodes, NodeQuery,
};
pub use tree::{Node, NodeId, SyntaxTree, TreeBuilder};
pub use validator::{validate_edit, validate_syntax};
