use crate::config::schema::{PatchConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Discover {
        dir: PathBuf,
        source: walkdir::Error,
    },
    Parse {
        origin: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Invalid {
        origin: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn origin(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } => Some(path),
            ConfigError::Discover { dir, .. } => Some(dir),
            ConfigError::Parse { origin, .. } | ConfigError::Invalid { origin, .. } => {
                origin.as_deref()
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = self
            .origin()
            .map(|p| format!(" {}", p.display()))
            .unwrap_or_default();
        match self {
            ConfigError::Read { source, .. } => {
                write!(f, "cannot read patch file{origin}: {source}")
            }
            ConfigError::Discover { source, .. } => {
                write!(f, "cannot list patch files in{origin}: {source}")
            }
            ConfigError::Parse { source, .. } => {
                write!(f, "malformed patch file{origin}: {source}")
            }
            ConfigError::Invalid { source, .. } => {
                write!(f, "invalid patch file{origin}:\n{source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Discover { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { source, .. } => Some(source),
        }
    }
}

fn parse(input: &str, origin: Option<&Path>) -> Result<PatchConfig, ConfigError> {
    let origin = || origin.map(Path::to_path_buf);
    let config: PatchConfig = toml_edit::de::from_str(input).map_err(|source| {
        ConfigError::Parse {
            origin: origin(),
            source,
        }
    })?;
    config.validate().map_err(|source| ConfigError::Invalid {
        origin: origin(),
        source,
    })?;
    Ok(config)
}

pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    parse(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let input = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&input, Some(path))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Every `*.toml` under `dir`, skipping hidden entries, in path order.
pub fn discover_patch_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ConfigError> {
    let dir = dir.as_ref();
    let mut found = Vec::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|source| ConfigError::Discover {
            dir: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "toml") {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}
