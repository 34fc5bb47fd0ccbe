//! Workspace boundary for on-disk edits.
//!
//! Generators only ever touch project sources. Installed packages, VCS
//! metadata and build output are off limits even though they live under the
//! workspace root.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Top-level workspace directories that are never edited.
pub const PROTECTED_DIRS: &[&str] = &["node_modules", ".git", "dist"];

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("{} escapes the workspace at {}", .path.display(), .root.display())]
    OutsideWorkspace { path: PathBuf, root: PathBuf },

    #[error("{} is inside protected directory {}", .path.display(), .dir.display())]
    ForbiddenPath { path: PathBuf, dir: PathBuf },

    #[error("cannot resolve {}: {source}", .path.display())]
    Resolve {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolves workspace-relative paths to canonical absolute ones, refusing
/// anything that lands outside the root or under a protected directory.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
    protected: Vec<PathBuf>,
}

impl WorkspaceGuard {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = canonical(root.as_ref())?;
        // A protected dir may itself be a symlink (pnpm's node_modules often is).
        let protected = PROTECTED_DIRS
            .iter()
            .map(|name| {
                let dir = root.join(name);
                dir.canonicalize().unwrap_or(dir)
            })
            .collect();
        Ok(Self { root, protected })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.root
    }

    /// Absolute, canonical form of `path` if it may be edited.
    ///
    /// Relative paths are taken from the workspace root. Files that do not
    /// exist yet are resolved through their closest existing ancestor, so a
    /// new file is judged by the directory it would be created in.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        self.check(self.resolve(&absolute)?)
    }

    /// Validate an already-resolved path again, right before writing to it.
    pub fn revalidate(&self, resolved: &Path) -> Result<PathBuf, SafetyError> {
        self.check(self.resolve(resolved)?)
    }

    fn resolve(&self, absolute: &Path) -> Result<PathBuf, SafetyError> {
        let escape = || SafetyError::OutsideWorkspace {
            path: absolute.to_path_buf(),
            root: self.root.clone(),
        };

        let mut tail: Vec<OsString> = Vec::new();
        let mut ancestor = absolute;
        while !ancestor.exists() {
            // `file_name` is None for a trailing `..`, which cannot be
            // resolved without the directory it climbs out of.
            let name = ancestor.file_name().ok_or_else(escape)?;
            tail.push(name.to_os_string());
            ancestor = ancestor.parent().ok_or_else(escape)?;
        }

        let mut resolved = canonical(ancestor)?;
        resolved.extend(tail.into_iter().rev());
        if resolved.components().any(|c| c == Component::ParentDir) {
            return Err(escape());
        }
        Ok(resolved)
    }

    fn check(&self, resolved: PathBuf) -> Result<PathBuf, SafetyError> {
        if !resolved.starts_with(&self.root) {
            return Err(SafetyError::OutsideWorkspace {
                path: resolved,
                root: self.root.clone(),
            });
        }
        if let Some(dir) = self.protected.iter().find(|dir| resolved.starts_with(dir)) {
            return Err(SafetyError::ForbiddenPath {
                path: resolved,
                dir: dir.clone(),
            });
        }
        Ok(resolved)
    }
}

fn canonical(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize().map_err(|source| SafetyError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}
