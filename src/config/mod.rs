pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{
    apply_patches, check_patches, preview_patches, ApplicationError, PatchOutcome, PatchResult,
};
pub use loader::{discover_patch_files, load_from_path, load_from_str, ConfigError};
pub use schema::{
    Anchor, Fallback, Metadata, Operation, PatchConfig, PatchDefinition, Position, Scope,
    Selector, ValidationError, ValidationIssue,
};
