//! Schematic Patcher: structured source patching for Angular/TypeScript workspaces
//!
//! Patches are positioned by syntax, not by text search. A file is parsed
//! into a [`SyntaxTree`], anchor nodes are located with [`find_nodes`], and
//! an insertion point is resolved relative to them. The result is a
//! [`Change`], and changes are batched per file and committed through a
//! [`Host`].
//!
//! # Architecture
//!
//! Every modification compiles down to one of three primitives (insert,
//! remove, replace) expressed against the *original* text of a file. Batches
//! are staged on an [`UpdateRecorder`] which rejects overlapping or stale
//! changes before anything is rendered, so a committed file is always the
//! original text plus every accepted change.
//!
//! # Safety
//!
//! - Removals and replacements verify the text they overwrite
//! - Atomic file writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//! - Byte offsets must fall on UTF-8 character boundaries
//! - Re-running a patch file is a no-op
//!
//! # Example
//!
//! ```
//! use schematic_patcher::anchor::{after_last_change, Placement};
//! use schematic_patcher::apply::Document;
//! use schematic_patcher::syntax::{find_nodes, NodeQuery, SyntaxKind};
//!
//! let doc = Document::new("src/main.ts", "import { a } from 'a';\n");
//! let tree = doc.parse().unwrap();
//! let imports = find_nodes(Some(tree.root()), &NodeQuery::new(SyntaxKind::Import));
//!
//! let change = after_last_change(
//!     doc.path(),
//!     &imports,
//!     "\nimport { b } from 'b';",
//!     &Placement::new(),
//! )
//! .unwrap();
//!
//! let patched = doc.apply(&[change]).unwrap();
//! assert_eq!(patched.text(), "import { a } from 'a';\nimport { b } from 'b';\n");
//! ```

pub mod anchor;
pub mod apply;
pub mod change;
pub mod config;
pub mod finders;
pub mod host;
pub mod pool;
pub mod safety;
pub mod syntax;
pub mod workspace;

// Re-exports
pub use anchor::{AnchorError, Placement};
pub use apply::{
    apply_changes, write_changes, ApplyError, ApplyOutcome, Document, FailurePolicy, FileOutcome,
    RejectedChange, UpdateRecorder,
};
pub use change::{Change, ChangeError, ChangeKind, EditVerification};
pub use config::{
    apply_patches, check_patches, load_from_path, load_from_str, preview_patches,
    ApplicationError, ConfigError, PatchConfig, PatchResult,
};
pub use host::{DiskHost, Host, HostError, MemoryHost};
pub use safety::{SafetyError, WorkspaceGuard};
pub use syntax::{find_node, find_nodes, Node, NodeQuery, SyntaxError, SyntaxKind, SyntaxTree};
pub use workspace::{ProjectConfig, WorkspaceConfig, WorkspaceError};
