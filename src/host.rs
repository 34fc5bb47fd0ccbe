//! The filesystem boundary.
//!
//! The engine never touches storage directly: it reads text through a [`Host`]
//! and hands back one [`UpdateRecorder`] per path to be committed. Tests and dry
//! runs use [`MemoryHost`]; the binary uses [`DiskHost`].

use crate::apply::UpdateRecorder;
use crate::safety::{SafetyError, WorkspaceGuard};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("{path} changed since the update was started")]
    Conflict { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

/// A virtual filesystem of text files addressed by workspace-relative paths.
pub trait Host {
    /// Current text of `path`, or `None` if it does not exist.
    fn read(&self, path: &Path) -> Result<Option<String>, HostError>;

    fn exists(&self, path: &Path) -> bool;

    /// Replace the whole text of `path`.
    fn write(&mut self, path: &Path, text: &str) -> Result<(), HostError>;

    /// Immediate children of `dir`, sorted.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, HostError>;

    /// Open an update session against the current text of `path`.
    fn begin_update(&self, path: &Path) -> Result<UpdateRecorder, HostError> {
        let text = self.read(path)?.ok_or_else(|| HostError::NotFound {
            path: path.to_path_buf(),
        })?;
        Ok(UpdateRecorder::new(path, text))
    }

    /// Render and write a session, refusing if the file moved underneath it.
    fn commit_update(&mut self, recorder: UpdateRecorder) -> Result<(), HostError> {
        let current = self.read(recorder.path())?;
        if current.as_deref() != Some(recorder.original()) {
            return Err(HostError::Conflict {
                path: recorder.path().to_path_buf(),
            });
        }
        self.write(recorder.path(), &recorder.render())
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// In-memory host, ordered by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a file.
    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), text.into());
    }

    pub fn files(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().map(|(p, t)| (p.as_path(), t.as_str()))
    }
}

impl Host for MemoryHost {
    fn read(&self, path: &Path) -> Result<Option<String>, HostError> {
        Ok(self.files.get(&normalize(path)).cloned())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }

    fn write(&mut self, path: &Path, text: &str) -> Result<(), HostError> {
        self.insert(path, text);
        Ok(())
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, HostError> {
        let dir = normalize(dir);
        let mut entries: Vec<PathBuf> = self
            .files
            .keys()
            .filter_map(|path| {
                let rest = path.strip_prefix(&dir).ok()?;
                let first = rest.components().next()?;
                Some(dir.join(first))
            })
            .collect();
        entries.dedup();
        Ok(entries)
    }
}

/// Host backed by a workspace directory on disk.
#[derive(Debug, Clone)]
pub struct DiskHost {
    guard: WorkspaceGuard,
}

impl DiskHost {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, HostError> {
        Ok(Self {
            guard: WorkspaceGuard::new(root)?,
        })
    }

    pub fn root(&self) -> &Path {
        self.guard.workspace_root()
    }
}

impl Host for DiskHost {
    fn read(&self, path: &Path) -> Result<Option<String>, HostError> {
        let resolved = self.guard.validate_path(path)?;
        if !resolved.is_file() {
            return Ok(None);
        }
        fs::read_to_string(&resolved)
            .map(Some)
            .map_err(|source| HostError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    fn exists(&self, path: &Path) -> bool {
        self.guard
            .validate_path(path)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    fn write(&mut self, path: &Path, text: &str) -> Result<(), HostError> {
        let resolved = self.guard.validate_path(path)?;
        let io_err = |source| HostError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let resolved = self.guard.revalidate(&resolved)?;

        atomic_write(&resolved, text.as_bytes()).map_err(io_err)?;

        // Update mtime
        let now = filetime::FileTime::now();
        filetime::set_file_mtime(&resolved, now).map_err(io_err)?;

        debug!(path = %resolved.display(), bytes = text.len(), "wrote file");
        Ok(())
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, HostError> {
        let resolved = self.guard.validate_path(dir)?;
        if !resolved.is_dir() {
            return Ok(Vec::new());
        }
        let io_err = |source| HostError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = Vec::new();
        for entry in fs::read_dir(&resolved).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            entries.push(dir.join(entry.file_name()));
        }
        entries.sort();
        Ok(entries)
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or nothing changes.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    // Create tempfile in same directory to ensure same filesystem
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent directory")
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
