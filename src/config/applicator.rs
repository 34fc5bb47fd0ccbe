//! Patch applicator - applies patch definitions through a [`Host`]
//!
//! Patches are grouped by file. Each file is parsed once, every patch's
//! anchor is resolved against that single snapshot, all resulting changes are
//! staged in one update session, and the session is committed once.

use crate::anchor::{after_last_change, before_first_change, AnchorError, Placement};
use crate::apply::FailurePolicy;
use crate::change::Change;
use crate::config::schema::{
    Anchor, Fallback, Metadata, Operation, PatchConfig, PatchDefinition, Position, Scope,
};
use crate::finders::{expect_unique, is_named, FinderError};
use crate::host::{Host, HostError, MemoryHost};
use crate::pool::with_parser;
use crate::syntax::{
    find_nodes, validate_edit, Dialect, Node, NodeQuery, SourceParser, SyntaxKind, SyntaxTree,
};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of applying a single patch
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchResult should be checked for success/failure"]
pub enum PatchResult {
    /// Patch was successfully applied
    Applied { file: PathBuf },
    /// Patch was already applied (idempotent check passed)
    AlreadyApplied { file: PathBuf },
    /// Patch resolved but its change was refused
    Rejected { file: PathBuf, reason: String },
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied { file } => {
                write!(f, "Applied patch to {}", file.display())
            }
            PatchResult::AlreadyApplied { file } => {
                write!(f, "Already applied to {}", file.display())
            }
            PatchResult::Rejected { file, reason } => {
                write!(f, "Rejected on {}: {}", file.display(), reason)
            }
        }
    }
}

/// Errors during patch application
#[derive(Debug)]
pub enum ApplicationError {
    /// Target file does not exist
    MissingFile { file: PathBuf },
    /// Target file could not be read, parsed or written
    Unavailable { file: PathBuf, reason: String },
    /// A scope or target did not resolve to exactly one node
    Finder { file: PathBuf, source: FinderError },
    /// No insertion point could be computed
    Anchor { file: PathBuf, source: AnchorError },
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::MissingFile { file } => {
                write!(f, "file not found: {}", file.display())
            }
            ApplicationError::Unavailable { file, reason } => {
                write!(f, "{}: {}", file.display(), reason)
            }
            ApplicationError::Finder { file, source } => {
                write!(f, "in {}: {}", file.display(), source)
            }
            ApplicationError::Anchor { file, source } => {
                write!(f, "anchor failed in {}: {}", file.display(), source)
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Finder { source, .. } => Some(source),
            ApplicationError::Anchor { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type PatchOutcome = (String, Result<PatchResult, ApplicationError>);

enum Plan {
    AlreadyApplied,
    Change(Change),
}

/// Apply a patch configuration through `host`.
///
/// Returns one result per patch, in configuration order.
pub fn apply_patches<H: Host + ?Sized>(config: &PatchConfig, host: &mut H) -> Vec<PatchOutcome> {
    let mut files: Vec<&str> = Vec::new();
    let mut patches_by_file: HashMap<&str, Vec<(usize, &PatchDefinition)>> = HashMap::new();
    for (idx, patch) in config.patches.iter().enumerate() {
        let entry = patches_by_file.entry(patch.file.as_str()).or_default();
        if entry.is_empty() {
            files.push(patch.file.as_str());
        }
        entry.push((idx, patch));
    }

    let mut results = Vec::with_capacity(config.patches.len());
    for file in files {
        let patches = patches_by_file.remove(file).unwrap_or_default();
        results.extend(apply_file_patches(&config.meta, host, Path::new(file), &patches));
    }

    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Check patch status without mutating the workspace.
///
/// This mirrors `apply_patches` result semantics (`Applied` means "would apply"),
/// while running all edits against an in-memory copy of the patched files.
pub fn check_patches<H: Host + ?Sized>(config: &PatchConfig, host: &H) -> Vec<PatchOutcome> {
    preview_patches(config, host).0
}

/// Apply `config` to an in-memory copy of its target files.
///
/// The returned host holds the patched text of every file that could be read.
pub fn preview_patches<H: Host + ?Sized>(
    config: &PatchConfig,
    host: &H,
) -> (Vec<PatchOutcome>, MemoryHost) {
    let mut memory = MemoryHost::new();
    for patch in &config.patches {
        match host.read(Path::new(&patch.file)) {
            Ok(Some(text)) => memory.insert(&patch.file, text),
            Ok(None) => {}
            Err(error) => warn!(file = %patch.file, %error, "cannot read patch target"),
        }
    }
    let results = apply_patches(config, &mut memory);
    (results, memory)
}

fn fan_out(
    patches: &[(usize, &PatchDefinition)],
    error: impl Fn() -> ApplicationError,
) -> Vec<(usize, PatchOutcome)> {
    patches
        .iter()
        .map(|(idx, patch)| (*idx, (patch.id.clone(), Err(error()))))
        .collect()
}

fn apply_file_patches<H: Host + ?Sized>(
    meta: &Metadata,
    host: &mut H,
    file: &Path,
    patches: &[(usize, &PatchDefinition)],
) -> Vec<(usize, PatchOutcome)> {
    let mut recorder = match host.begin_update(file) {
        Ok(recorder) => recorder,
        Err(HostError::NotFound { .. }) => {
            return fan_out(patches, || ApplicationError::MissingFile {
                file: file.to_path_buf(),
            })
        }
        Err(error) => {
            let reason = error.to_string();
            return fan_out(patches, || ApplicationError::Unavailable {
                file: file.to_path_buf(),
                reason: reason.clone(),
            });
        }
    };

    let dialect = Dialect::from_path(file);
    let tree = match with_parser(dialect, |parser| parser.parse(recorder.original())) {
        Ok(Ok(tree)) => tree,
        Ok(Err(error)) | Err(error) => {
            let reason = format!("failed to parse: {error}");
            return fan_out(patches, || ApplicationError::Unavailable {
                file: file.to_path_buf(),
                reason: reason.clone(),
            });
        }
    };

    let mut outcomes: Vec<(usize, PatchOutcome)> = Vec::with_capacity(patches.len());
    let mut staged = Vec::new();
    for (idx, patch) in patches {
        let result = match plan_patch(patch, file, &tree) {
            Ok(Plan::AlreadyApplied) => Ok(PatchResult::AlreadyApplied {
                file: file.to_path_buf(),
            }),
            Ok(Plan::Change(change)) => match recorder.stage(&change) {
                Ok(()) => {
                    debug!(patch = %patch.id, change = %change, "staged patch");
                    staged.push(outcomes.len());
                    Ok(PatchResult::Applied {
                        file: file.to_path_buf(),
                    })
                }
                Err(error) => {
                    warn!(patch = %patch.id, %error, "patch rejected");
                    Ok(PatchResult::Rejected {
                        file: file.to_path_buf(),
                        reason: error.to_string(),
                    })
                }
            },
            Err(error) => {
                warn!(patch = %patch.id, %error, "patch failed");
                Err(error)
            }
        };
        outcomes.push((*idx, (patch.id.clone(), result)));
    }

    let reject_staged = |outcomes: &mut Vec<(usize, PatchOutcome)>, reason: &str| {
        for &slot in &staged {
            outcomes[slot].1 .1 = Ok(PatchResult::Rejected {
                file: file.to_path_buf(),
                reason: reason.to_string(),
            });
        }
    };

    let any_failed = outcomes
        .iter()
        .any(|(_, (_, result))| matches!(result, Err(_) | Ok(PatchResult::Rejected { .. })));
    if meta.policy == FailurePolicy::AllOrNothing && any_failed {
        reject_staged(
            &mut outcomes,
            &format!("not applied: another patch for {} failed", file.display()),
        );
        return outcomes;
    }

    if staged.is_empty() {
        return outcomes;
    }

    if meta.validate_syntax {
        if let Err(error) = validate_edit(recorder.original(), &recorder.render(), dialect) {
            reject_staged(
                &mut outcomes,
                &format!("patched file would not parse: {error}"),
            );
            return outcomes;
        }
    }

    match host.commit_update(recorder) {
        Ok(()) => info!(file = %file.display(), patches = staged.len(), "patched file"),
        Err(error) => {
            for &slot in &staged {
                outcomes[slot].1 .1 = Err(ApplicationError::Unavailable {
                    file: file.to_path_buf(),
                    reason: format!("commit failed: {error}"),
                });
            }
        }
    }
    outcomes
}

fn plan_patch(
    patch: &PatchDefinition,
    file: &Path,
    tree: &SyntaxTree,
) -> Result<Plan, ApplicationError> {
    let finder_err = |source| ApplicationError::Finder {
        file: file.to_path_buf(),
        source,
    };
    let scope = resolve_scope(tree.root(), patch.within()).map_err(finder_err)?;

    if let Some(marker) = &patch.skip_if_present {
        let present = scope
            .descendants()
            .any(|n| n.kind() == SyntaxKind::Identifier && n.text() == marker);
        if present {
            return Ok(Plan::AlreadyApplied);
        }
    }

    let change = match &patch.operation {
        Operation::Insert {
            position,
            text,
            anchor,
        } => {
            let nodes = anchor_nodes(scope, anchor);
            let place = |fallback| {
                let placement = Placement {
                    drill: anchor.drill,
                    offset: anchor.offset,
                    fallback,
                };
                match position {
                    Position::AfterLast => after_last_change(file, &nodes, text, &placement),
                    Position::BeforeFirst => before_first_change(file, &nodes, text, &placement),
                }
            };
            // The fallback only matters once no anchor was selected.
            let planned = match place(None) {
                Err(AnchorError::NoAnchor { .. }) if anchor.fallback.is_some() => {
                    place(resolve_fallback(scope, anchor.fallback.as_ref()).map_err(finder_err)?)
                }
                planned => planned,
            };
            planned.map_err(|source| ApplicationError::Anchor {
                file: file.to_path_buf(),
                source,
            })?
        }
        Operation::Remove { target } => {
            let node = resolve_scope(scope, &[target.target()]).map_err(finder_err)?;
            Change::remove_node(file, node)
        }
        Operation::Replace { target, text } => {
            let node = resolve_scope(scope, &[target.target()]).map_err(finder_err)?;
            if node.text() == text {
                return Ok(Plan::AlreadyApplied);
            }
            Change::replace_node(file, node, text.clone())
        }
    };
    Ok(Plan::Change(change))
}

fn scope_matches(node: Node<'_>, scope: &Scope) -> bool {
    node.kind() == scope.kind
        && scope.name.as_deref().map_or(true, |name| is_named(node, name))
        && scope.text.as_deref().map_or(true, |text| node.text() == text)
}

/// Narrow from `root` through each scope in turn; each step must be unique.
fn resolve_scope<'t>(root: Node<'t>, scopes: &[Scope]) -> Result<Node<'t>, FinderError> {
    scopes.iter().try_fold(root, |current, scope| {
        let matches = current
            .descendants()
            .skip(1)
            .filter(|n| scope_matches(*n, scope))
            .collect();
        expect_unique(matches, &scope.to_string())
    })
}

/// Existing nodes the insertion is positioned against, strictly inside `scope`.
fn anchor_nodes<'t>(scope: Node<'t>, anchor: &Anchor) -> Vec<Node<'t>> {
    let Some(kind) = anchor.kind else {
        return Vec::new();
    };
    let query = NodeQuery {
        kind,
        text: anchor.text.clone(),
        max: None,
        recursive: anchor.recursive,
    };
    let limit = anchor.max.unwrap_or(usize::MAX);

    let mut nodes = Vec::new();
    for child in scope.children() {
        let found = find_nodes(Some(child), &query);
        nodes.extend(found.into_iter().filter(|n| {
            anchor
                .name
                .as_deref()
                .map_or(true, |name| is_named(*n, name))
        }));
        if nodes.len() >= limit {
            nodes.truncate(limit);
            break;
        }
    }
    nodes
}

fn resolve_fallback(
    scope: Node<'_>,
    fallback: Option<&Fallback>,
) -> Result<Option<i64>, FinderError> {
    match fallback {
        None => Ok(None),
        Some(Fallback::Offset(pos)) => Ok(Some(*pos)),
        Some(Fallback::Inside { inside }) => scope
            .descendants()
            .find(|n| n.kind() == *inside && n.end() > n.start())
            .map(|n| Some(n.end() as i64 - 1))
            .ok_or_else(|| FinderError::NoMatch {
                what: format!("{inside} for the fallback position"),
            }),
    }
}
