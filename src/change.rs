//! Textual changes to a single document.
//!
//! A [`Change`] is a planned mutation at a byte offset of one file: an
//! insertion, a removal, or a replacement. Removals and replacements can
//! carry a snapshot of the text they expect to find; the snapshot is checked
//! against the live text when the change is applied.

use crate::syntax::Node;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Verification of the text a change expects to find at its span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (used for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

impl fmt::Display for EditVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditVerification::ExactMatch(text) => write!(f, "{text:?}"),
            EditVerification::Hash(hash) => write!(f, "<xxh3 {hash:016x}>"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChangeError {
    #[error("negative position {pos} is invalid")]
    InvalidPosition { pos: i64 },

    #[error("span [{start}, {end}) is outside the {len}-byte text of {path} or splits a character")]
    OutOfBounds {
        path: PathBuf,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("stale anchor in {path} at {pos}: expected {expected}, found {found:?}")]
    StaleAnchor {
        path: PathBuf,
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("invalid replace in {path} at {pos}: expected {expected}, found {found:?}")]
    ReplaceMismatch {
        path: PathBuf,
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("change at {pos} in {path} overlaps a change already staged at [{other_start}, {other_end})")]
    Overlap {
        path: PathBuf,
        pos: usize,
        other_start: usize,
        other_end: usize,
    },

    #[error("change targets {found} but the update session is for {expected}")]
    PathMismatch { expected: PathBuf, found: PathBuf },
}

/// What a [`Change`] does at its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Insert {
        text: String,
    },
    Remove {
        len: usize,
        expected: Option<EditVerification>,
    },
    Replace {
        len: usize,
        expected: EditVerification,
        new_text: String,
    },
}

/// A single planned edit of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a Change does nothing until it is staged or applied"]
pub struct Change {
    path: PathBuf,
    pos: usize,
    kind: ChangeKind,
}

fn checked_pos(pos: i64) -> Result<usize, ChangeError> {
    usize::try_from(pos).map_err(|_| ChangeError::InvalidPosition { pos })
}

impl Change {
    /// Insert `text` at `pos`.
    pub fn insert(
        path: impl Into<PathBuf>,
        pos: i64,
        text: impl Into<String>,
    ) -> Result<Self, ChangeError> {
        Ok(Self {
            path: path.into(),
            pos: checked_pos(pos)?,
            kind: ChangeKind::Insert { text: text.into() },
        })
    }

    /// Remove `len` bytes at `pos` without checking what they are.
    pub fn remove(path: impl Into<PathBuf>, pos: i64, len: usize) -> Result<Self, ChangeError> {
        Ok(Self {
            path: path.into(),
            pos: checked_pos(pos)?,
            kind: ChangeKind::Remove {
                len,
                expected: None,
            },
        })
    }

    /// Remove `expected` at `pos`, failing at apply time if the text there differs.
    pub fn remove_text(
        path: impl Into<PathBuf>,
        pos: i64,
        expected: &str,
    ) -> Result<Self, ChangeError> {
        Ok(Self {
            path: path.into(),
            pos: checked_pos(pos)?,
            kind: ChangeKind::Remove {
                len: expected.len(),
                expected: Some(EditVerification::from_text(expected)),
            },
        })
    }

    /// Replace `old_text` at `pos` with `new_text`.
    pub fn replace(
        path: impl Into<PathBuf>,
        pos: i64,
        old_text: &str,
        new_text: impl Into<String>,
    ) -> Result<Self, ChangeError> {
        Ok(Self {
            path: path.into(),
            pos: checked_pos(pos)?,
            kind: ChangeKind::Replace {
                len: old_text.len(),
                expected: EditVerification::from_text(old_text),
                new_text: new_text.into(),
            },
        })
    }

    /// Remove a node's exact span, snapshotting its current text.
    pub fn remove_node(path: impl Into<PathBuf>, node: Node<'_>) -> Self {
        Self {
            path: path.into(),
            pos: node.start(),
            kind: ChangeKind::Remove {
                len: node.end() - node.start(),
                expected: Some(EditVerification::from_text(node.text())),
            },
        }
    }

    /// Replace a node's exact span with `new_text`.
    pub fn replace_node(path: impl Into<PathBuf>, node: Node<'_>, new_text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pos: node.start(),
            kind: ChangeKind::Replace {
                len: node.end() - node.start(),
                expected: EditVerification::from_text(node.text()),
                new_text: new_text.into(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn kind(&self) -> &ChangeKind {
        &self.kind
    }

    /// Sort key of the change: its position in the original text.
    pub fn order(&self) -> usize {
        self.pos
    }

    /// Number of original bytes this change consumes.
    pub fn removed_len(&self) -> usize {
        match &self.kind {
            ChangeKind::Insert { .. } => 0,
            ChangeKind::Remove { len, .. } | ChangeKind::Replace { len, .. } => *len,
        }
    }

    /// Text this change puts into the document.
    pub fn inserted_text(&self) -> &str {
        match &self.kind {
            ChangeKind::Insert { text } => text,
            ChangeKind::Remove { .. } => "",
            ChangeKind::Replace { new_text, .. } => new_text,
        }
    }

    pub fn description(&self) -> String {
        let path = self.path.display();
        match &self.kind {
            ChangeKind::Insert { text } => {
                format!("Inserted {text:?} into position {} of {path}", self.pos)
            }
            ChangeKind::Remove { len, .. } => {
                format!("Removed {len} bytes at position {} of {path}", self.pos)
            }
            ChangeKind::Replace { expected, new_text, .. } => format!(
                "Replaced {expected} at position {} of {path} with {new_text:?}",
                self.pos
            ),
        }
    }

    /// Check bounds and the captured snapshot against `content`.
    pub fn verify(&self, content: &str) -> Result<(), ChangeError> {
        let start = self.pos;
        let end = start.saturating_add(self.removed_len());
        if end > content.len() || !content.is_char_boundary(start) || !content.is_char_boundary(end)
        {
            return Err(ChangeError::OutOfBounds {
                path: self.path.clone(),
                start,
                end,
                len: content.len(),
            });
        }

        let found = &content[start..end];
        match &self.kind {
            ChangeKind::Insert { .. } | ChangeKind::Remove { expected: None, .. } => Ok(()),
            ChangeKind::Remove {
                expected: Some(expected),
                ..
            } => {
                if expected.matches(found) {
                    Ok(())
                } else {
                    Err(ChangeError::StaleAnchor {
                        path: self.path.clone(),
                        pos: start,
                        expected: expected.to_string(),
                        found: found.to_string(),
                    })
                }
            }
            ChangeKind::Replace { expected, .. } => {
                if expected.matches(found) {
                    Ok(())
                } else {
                    Err(ChangeError::ReplaceMismatch {
                        path: self.path.clone(),
                        pos: start,
                        expected: expected.to_string(),
                        found: found.to_string(),
                    })
                }
            }
        }
    }

    /// Apply this change alone to `content`.
    pub fn apply_to(&self, content: &str) -> Result<String, ChangeError> {
        self.verify(content)?;
        let end = self.pos + self.removed_len();
        let inserted = self.inserted_text();

        let mut out = String::with_capacity(content.len() + inserted.len());
        out.push_str(&content[..self.pos]);
        out.push_str(inserted);
        out.push_str(&content[end..]);
        Ok(out)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
