//! Atomic application of a batch of changes to one document.
//!
//! Every change in a batch is positioned against the same original text. The
//! [`UpdateRecorder`] collects them without touching that text and renders the
//! result in a single pass, so the order in which changes are staged never
//! shifts another change's offset.

use crate::change::{Change, ChangeError};
use crate::host::{Host, HostError};
use crate::pool::with_parser;
use crate::syntax::{Dialect, SourceParser, SyntaxError, SyntaxTree};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// What to do with the rest of a batch when one change is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Drop the failing change, keep the others.
    #[default]
    PerEdit,
    /// Fail the whole batch.
    AllOrNothing,
}

/// A change that could not be staged, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedChange {
    pub change: Change,
    pub error: ChangeError,
}

impl fmt::Display for RejectedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.change.description(), self.error)
    }
}

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("{} of the changes to {} were rejected; first: {}", .rejected.len(), .path.display(), first_reason(.rejected))]
    Rejected {
        path: PathBuf,
        rejected: Vec<RejectedChange>,
    },

    #[error(transparent)]
    Change(#[from] ChangeError),

    #[error(transparent)]
    Host(#[from] HostError),
}

fn first_reason(rejected: &[RejectedChange]) -> String {
    rejected
        .first()
        .map(|r| r.error.to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StagedOp {
    pos: usize,
    len: usize,
    text: String,
    seq: usize,
}

impl StagedOp {
    fn end(&self) -> usize {
        self.pos + self.len
    }

    fn is_insert(&self) -> bool {
        self.len == 0
    }
}

/// Scoped update session for one path.
///
/// All positions refer to the original text the recorder was opened with.
/// Insertions are placed to the left: several inserts at one offset appear in
/// the order they were staged, before the original content at that offset and
/// before any removal starting there.
#[derive(Debug, Clone)]
pub struct UpdateRecorder {
    path: PathBuf,
    original: String,
    ops: Vec<StagedOp>,
}

impl UpdateRecorder {
    pub fn new(path: impl Into<PathBuf>, original: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            original: original.into(),
            ops: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn check_bounds(&self, pos: usize, len: usize) -> Result<(), ChangeError> {
        let end = pos.saturating_add(len);
        if end > self.original.len()
            || !self.original.is_char_boundary(pos)
            || !self.original.is_char_boundary(end)
        {
            return Err(ChangeError::OutOfBounds {
                path: self.path.clone(),
                start: pos,
                end,
                len: self.original.len(),
            });
        }
        Ok(())
    }

    fn overlap(&self, pos: usize, op: &StagedOp) -> ChangeError {
        ChangeError::Overlap {
            path: self.path.clone(),
            pos,
            other_start: op.pos,
            other_end: op.end(),
        }
    }

    fn push(&mut self, pos: usize, len: usize, text: String) -> Result<(), ChangeError> {
        self.check_bounds(pos, len)?;
        let end = pos + len;
        for op in &self.ops {
            let conflict = if len == 0 {
                // An insert may touch a removed range but not land inside it.
                !op.is_insert() && op.pos < pos && pos < op.end()
            } else if op.is_insert() {
                pos < op.pos && op.pos < end
            } else {
                pos < op.end() && op.pos < end
            };
            if conflict {
                return Err(self.overlap(pos, op));
            }
        }
        let seq = self.ops.len();
        self.ops.push(StagedOp {
            pos,
            len,
            text,
            seq,
        });
        Ok(())
    }

    /// Stage an insertion of `text` at `pos`.
    pub fn insert_left(&mut self, pos: usize, text: impl Into<String>) -> Result<(), ChangeError> {
        self.push(pos, 0, text.into())
    }

    /// Stage removal of `len` bytes at `pos`.
    pub fn remove(&mut self, pos: usize, len: usize) -> Result<(), ChangeError> {
        if len == 0 {
            return self.check_bounds(pos, 0);
        }
        self.push(pos, len, String::new())
    }

    /// Stage a planned [`Change`] after checking its path, bounds and snapshot.
    pub fn stage(&mut self, change: &Change) -> Result<(), ChangeError> {
        if change.path() != self.path {
            return Err(ChangeError::PathMismatch {
                expected: self.path.clone(),
                found: change.path().to_path_buf(),
            });
        }
        change.verify(&self.original)?;

        let len = change.removed_len();
        let text = change.inserted_text();
        if len == 0 && text.is_empty() {
            return Ok(());
        }
        if len == 0 {
            self.insert_left(change.pos(), text)
        } else {
            self.push(change.pos(), len, text.to_string())
        }
    }

    /// Produce the updated text.
    pub fn render(&self) -> String {
        let mut ops: Vec<&StagedOp> = self.ops.iter().collect();
        ops.sort_by_key(|op| (op.pos, !op.is_insert(), op.seq));

        let added: usize = ops.iter().map(|op| op.text.len()).sum();
        let mut out = String::with_capacity(self.original.len() + added);
        let mut cursor = 0;
        for op in ops {
            // Staging keeps ops disjoint, so the cursor never passes an op.
            out.push_str(&self.original[cursor..op.pos]);
            out.push_str(&op.text);
            cursor = op.end();
        }
        out.push_str(&self.original[cursor..]);
        out
    }
}

/// Result of applying a batch under a [`FailurePolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub text: String,
    pub applied: Vec<Change>,
    pub rejected: Vec<RejectedChange>,
}

fn stage_all(
    recorder: &mut UpdateRecorder,
    changes: &[Change],
    policy: FailurePolicy,
) -> Result<(Vec<Change>, Vec<RejectedChange>), ApplyError> {
    let mut applied = Vec::with_capacity(changes.len());
    let mut rejected = Vec::new();

    for change in changes {
        match recorder.stage(change) {
            Ok(()) => {
                debug!(path = %recorder.path().display(), pos = change.pos(), "staged change");
                applied.push(change.clone());
            }
            Err(error) => {
                warn!(path = %recorder.path().display(), pos = change.pos(), %error, "rejected change");
                rejected.push(RejectedChange {
                    change: change.clone(),
                    error,
                });
            }
        }
    }

    if policy == FailurePolicy::AllOrNothing && !rejected.is_empty() {
        return Err(ApplyError::Rejected {
            path: recorder.path().to_path_buf(),
            rejected,
        });
    }
    Ok((applied, rejected))
}

/// Apply `changes` to `original` in one pass.
///
/// The update session is opened for the path of the first change; changes to
/// any other path are rejected with [`ChangeError::PathMismatch`].
///
/// # Example
///
/// ```
/// use schematic_patcher::apply::{apply_changes, FailurePolicy};
/// use schematic_patcher::change::Change;
///
/// let changes = vec![
///     Change::insert("a.ts", 7, "B")?,
///     Change::insert("a.ts", 3, "A")?,
/// ];
/// let outcome = apply_changes("0123456789", &changes, FailurePolicy::AllOrNothing)?;
/// assert_eq!(outcome.text, "012A3456B789");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn apply_changes(
    original: &str,
    changes: &[Change],
    policy: FailurePolicy,
) -> Result<ApplyOutcome, ApplyError> {
    let path = changes
        .first()
        .map(|c| c.path().to_path_buf())
        .unwrap_or_default();
    let mut recorder = UpdateRecorder::new(path, original);
    let (applied, rejected) = stage_all(&mut recorder, changes, policy)?;
    Ok(ApplyOutcome {
        text: recorder.render(),
        applied,
        rejected,
    })
}

/// A path plus its current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    text: String,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Load a document through `host`.
    pub fn read<H: Host + ?Sized>(host: &H, path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref();
        let text = host.read(path)?.ok_or_else(|| HostError::NotFound {
            path: path.to_path_buf(),
        })?;
        Ok(Self::new(path, text))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::from_path(&self.path)
    }

    /// Parse the current text. Trees are never reused across an apply.
    pub fn parse(&self) -> Result<SyntaxTree, SyntaxError> {
        with_parser(self.dialect(), |parser| parser.parse(&self.text))?
    }

    /// Apply a batch, failing if any change is rejected.
    pub fn apply(&self, changes: &[Change]) -> Result<Document, ApplyError> {
        let outcome = self.apply_with(changes, FailurePolicy::AllOrNothing)?;
        Ok(Self::new(self.path.clone(), outcome.text))
    }

    /// Apply a batch under `policy`.
    pub fn apply_with(
        &self,
        changes: &[Change],
        policy: FailurePolicy,
    ) -> Result<ApplyOutcome, ApplyError> {
        let mut recorder = UpdateRecorder::new(self.path.clone(), self.text.clone());
        let (applied, rejected) = stage_all(&mut recorder, changes, policy)?;
        Ok(ApplyOutcome {
            text: recorder.render(),
            applied,
            rejected,
        })
    }
}

/// Result of committing one file's batch through a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub applied: Vec<Change>,
    pub rejected: Vec<RejectedChange>,
    /// Whether the host was written to.
    pub written: bool,
}

/// Stage `changes` against the host's current text for `path` and commit once.
///
/// Under [`FailurePolicy::AllOrNothing`] nothing is written when any change is
/// rejected. Under [`FailurePolicy::PerEdit`] the valid changes are written and
/// the rejections reported.
pub fn write_changes<H: Host + ?Sized>(
    host: &mut H,
    path: impl AsRef<Path>,
    changes: &[Change],
    policy: FailurePolicy,
) -> Result<FileOutcome, ApplyError> {
    let path = path.as_ref();
    let mut recorder = host.begin_update(path)?;
    let (applied, rejected) = stage_all(&mut recorder, changes, policy)?;

    let written = !recorder.is_empty();
    if written {
        host.commit_update(recorder)?;
        info!(path = %path.display(), applied = applied.len(), rejected = rejected.len(), "committed changes");
    }

    Ok(FileOutcome {
        path: path.to_path_buf(),
        applied,
        rejected,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use proptest::prelude::*;

    fn insert(pos: i64, text: &str) -> Change {
        Change::insert("a.ts", pos, text).unwrap()
    }

    #[test]
    fn inserts_use_original_offsets() {
        let changes = [insert(3, "AAA"), insert(7, "BB")];
        let outcome = apply_changes("0123456789", &changes, FailurePolicy::PerEdit).unwrap();
        assert_eq!(outcome.text, "012AAA3456BB789");
        assert_eq!(outcome.text.len(), 10 + 3 + 2);
        assert_eq!(outcome.applied.len(), 2);
    }

    #[test]
    fn same_offset_inserts_keep_authored_order() {
        let changes = [insert(4, "a"), insert(4, "b"), insert(4, "c")];
        let outcome = apply_changes("[1, ]", &changes, FailurePolicy::PerEdit).unwrap();
        assert_eq!(outcome.text, "[1, abc]");
    }

    #[test]
    fn insert_lands_before_removal_at_same_offset() {
        let changes = [
            Change::remove_text("a.ts", 2, "cd").unwrap(),
            insert(2, "X"),
            insert(4, "Y"),
        ];
        let outcome = apply_changes("abcdef", &changes, FailurePolicy::PerEdit).unwrap();
        assert_eq!(outcome.text, "abXYef");
    }

    #[test]
    fn replace_mismatch_leaves_text_untouched() {
        let change = Change::replace("a.ts", 5, "old", "new").unwrap();
        let ok = Document::new("a.ts", "xxxxxoldxxxx").apply(&[change.clone()]).unwrap();
        assert_eq!(ok.text(), "xxxxxnewxxxx");

        let doc = Document::new("a.ts", "xxxxxOLDxxxx");
        let err = doc.apply(&[change.clone()]).unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Rejected { ref rejected, .. }
                if matches!(rejected[0].error, ChangeError::ReplaceMismatch { .. })
        ));

        let outcome = doc.apply_with(&[change], FailurePolicy::PerEdit).unwrap();
        assert_eq!(outcome.text, "xxxxxOLDxxxx");
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn per_edit_keeps_valid_changes() {
        let changes = [
            insert(0, "// header\n"),
            Change::replace("a.ts", 0, "nope", "yes").unwrap(),
            insert(99, "out of range"),
        ];
        let outcome = apply_changes("let a = 1;", &changes, FailurePolicy::PerEdit).unwrap();
        assert_eq!(outcome.text, "// header\nlet a = 1;");
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.rejected.len(), 2);
        assert!(matches!(
            outcome.rejected[1].error,
            ChangeError::OutOfBounds { .. }
        ));
    }

    #[test]
    fn overlapping_changes_are_rejected() {
        let mut recorder = UpdateRecorder::new("a.ts", "abcdefgh");
        recorder.remove(2, 4).unwrap();
        assert!(matches!(
            recorder.remove(4, 2),
            Err(ChangeError::Overlap { other_start: 2, other_end: 6, .. })
        ));
        assert!(matches!(
            recorder.insert_left(3, "x"),
            Err(ChangeError::Overlap { .. })
        ));
        recorder.insert_left(6, "!").unwrap();
        assert_eq!(recorder.render(), "ab!gh");
    }

    #[test]
    fn removal_cannot_swallow_a_staged_insert() {
        let mut recorder = UpdateRecorder::new("a.ts", "abcdefgh");
        recorder.insert_left(4, "x").unwrap();
        assert!(recorder.remove(2, 4).is_err());
        recorder.remove(4, 2).unwrap();
        assert_eq!(recorder.render(), "abcdxgh");
    }

    #[test]
    fn path_mismatch_is_rejected() {
        let mut recorder = UpdateRecorder::new("a.ts", "abc");
        let err = recorder
            .stage(&Change::insert("b.ts", 0, "x").unwrap())
            .unwrap_err();
        assert!(matches!(err, ChangeError::PathMismatch { .. }));
    }

    #[test]
    fn empty_batch_is_identity() {
        let outcome = apply_changes("unchanged", &[], FailurePolicy::AllOrNothing).unwrap();
        assert_eq!(outcome.text, "unchanged");
    }

    #[test]
    fn write_changes_commits_once() {
        let mut host = MemoryHost::new();
        host.insert("src/app.ts", "const routes = [];\n");
        let changes = [Change::insert("src/app.ts", 16, "{ path: 'a' }").unwrap()];

        let outcome = write_changes(&mut host, "src/app.ts", &changes, FailurePolicy::PerEdit).unwrap();
        assert!(outcome.written);
        assert_eq!(
            host.read(Path::new("src/app.ts")).unwrap().as_deref(),
            Some("const routes = [{ path: 'a' }];\n")
        );
    }

    #[test]
    fn all_or_nothing_writes_nothing_on_rejection() {
        let mut host = MemoryHost::new();
        host.insert("a.ts", "abc");
        let changes = [insert(0, "x"), Change::replace("a.ts", 0, "zz", "y").unwrap()];

        let err = write_changes(&mut host, "a.ts", &changes, FailurePolicy::AllOrNothing);
        assert!(matches!(err, Err(ApplyError::Rejected { .. })));
        assert_eq!(host.read(Path::new("a.ts")).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn write_changes_on_missing_file() {
        let mut host = MemoryHost::new();
        let err = write_changes(&mut host, "gone.ts", &[], FailurePolicy::PerEdit).unwrap_err();
        assert!(matches!(err, ApplyError::Host(HostError::NotFound { .. })));
    }

    #[test]
    fn document_parse_after_apply_sees_new_nodes() {
        let doc = Document::new("a.ts", "const xs = [1];\n");
        let updated = doc.apply(&[insert(13, ", 2")]).unwrap();
        let tree = updated.parse().unwrap();
        assert!(!tree.has_errors());
        assert!(tree.source().contains("[1, 2]"));
    }

    proptest! {
        #[test]
        fn batch_result_is_order_independent(
            positions in proptest::collection::btree_set(0usize..=20, 1..6),
            seed in any::<u64>(),
        ) {
            let original = "abcdefghijklmnopqrst";
            let changes: Vec<Change> = positions
                .iter()
                .map(|&pos| Change::insert("a.ts", pos as i64, format!("<{pos}>")).unwrap())
                .collect();
            let expected = apply_changes(original, &changes, FailurePolicy::AllOrNothing)
                .unwrap()
                .text;

            let mut shuffled = changes.clone();
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            if seed % 2 == 1 {
                shuffled.reverse();
            }
            let text = apply_changes(original, &shuffled, FailurePolicy::AllOrNothing)
                .unwrap()
                .text;

            let added: usize = changes.iter().map(|c| c.inserted_text().len()).sum();
            prop_assert_eq!(text.len(), original.len() + added);
            prop_assert_eq!(text, expected);
        }
    }
}
