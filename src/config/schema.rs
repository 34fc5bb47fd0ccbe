use crate::apply::FailurePolicy;
use crate::syntax::SyntaxKind;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

impl PatchConfig {
    /// Collect every problem in the file rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        if self.patches.is_empty() {
            issues.push(ValidationIssue::EmptyPatchList);
        }

        let mut seen = HashSet::new();
        for patch in &self.patches {
            if !patch.id.trim().is_empty() && !seen.insert(patch.id.as_str()) {
                issues.push(patch.invalid("duplicate patch id".to_string()));
            }
            issues.extend(patch.issues());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub policy: FailurePolicy,
    /// Reject a file's batch if it introduces syntax errors.
    #[serde(default)]
    pub validate_syntax: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub id: String,
    /// Workspace-relative path of the file to patch.
    pub file: String,
    /// Identifier whose presence in scope means the patch is already applied.
    #[serde(default)]
    pub skip_if_present: Option<String>,
    pub operation: Operation,
}

impl PatchDefinition {
    /// Scopes the operation is resolved within.
    pub fn within(&self) -> &[Scope] {
        match &self.operation {
            Operation::Insert { anchor, .. } => &anchor.within,
            Operation::Remove { target } | Operation::Replace { target, .. } => &target.within,
        }
    }

    fn id(&self) -> Option<String> {
        let id = self.id.trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    fn missing(&self, field: &'static str) -> ValidationIssue {
        ValidationIssue::MissingField {
            patch_id: self.id(),
            field,
        }
    }

    fn invalid(&self, message: String) -> ValidationIssue {
        ValidationIssue::Invalid {
            patch_id: self.id(),
            message,
        }
    }

    fn issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.id().is_none() {
            issues.push(self.missing("id"));
        }
        if self.file.trim().is_empty() {
            issues.push(self.missing("file"));
        }
        if self
            .skip_if_present
            .as_deref()
            .is_some_and(|marker| marker.trim().is_empty())
        {
            issues.push(self.missing("skip_if_present"));
        }

        let (text_missing, shape) = match &self.operation {
            Operation::Insert { text, anchor, .. } => (text.is_empty(), anchor.validate()),
            Operation::Remove { target } => (false, target.validate()),
            Operation::Replace { target, text } => (text.trim().is_empty(), target.validate()),
        };
        if text_missing {
            issues.push(self.missing("operation.text"));
        }
        if let Err(message) = shape {
            issues.push(self.invalid(message));
        }
        issues
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    Insert {
        #[serde(default)]
        position: Position,
        text: String,
        #[serde(default)]
        anchor: Anchor,
    },
    Remove {
        target: Selector,
    },
    Replace {
        target: Selector,
        text: String,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    AfterLast,
    BeforeFirst,
}

/// One step of narrowing: the unique node of `kind` (named `name`, with
/// exact `text`) inside the previous scope.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: SyntaxKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(name) = &self.name {
            write!(f, " '{name}'")?;
        }
        if let Some(text) = &self.text {
            write!(f, " {text:?}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Anchor {
    #[serde(default)]
    pub within: Vec<Scope>,
    /// Kind of the existing nodes to insert after/before. Without it only the
    /// fallback position is used.
    #[serde(default)]
    pub kind: Option<SyntaxKind>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub max: Option<usize>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub drill: Option<SyntaxKind>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub fallback: Option<Fallback>,
}

impl Anchor {
    pub fn validate(&self) -> Result<(), String> {
        if self.kind.is_none() {
            if self.fallback.is_none() {
                return Err("anchor without kind requires a fallback".to_string());
            }
            if self.drill.is_some() || self.text.is_some() || self.name.is_some() {
                return Err("anchor drill, text and name require a kind".to_string());
            }
        }
        if self.max == Some(0) {
            return Err("anchor max must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Where to insert when no anchor node exists.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Fallback {
    /// A fixed byte offset.
    Offset(i64),
    /// Just inside the closing delimiter of the first node of this kind in scope.
    Inside { inside: SyntaxKind },
}

/// A unique node to remove or replace.
#[derive(Debug, Deserialize, Clone)]
pub struct Selector {
    #[serde(default)]
    pub within: Vec<Scope>,
    pub kind: SyntaxKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Selector {
    /// The targeted node, as one more narrowing step.
    pub fn target(&self) -> Scope {
        Scope {
            kind: self.kind,
            name: self.name.clone(),
            text: self.text.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.kind == SyntaxKind::SourceFile {
            return Err("target cannot be the whole source file".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.issues.iter().map(|i| format!("  - {i}")).collect();
        f.write_str(&lines.join("\n"))
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    Invalid {
        patch_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = |id: &Option<String>| match id {
            Some(id) => format!("patch '{id}'"),
            None => "patch".to_string(),
        };
        match self {
            ValidationIssue::EmptyPatchList => f.write_str("patch config contains no patches"),
            ValidationIssue::MissingField { patch_id, field } => {
                write!(f, "{} missing required field '{field}'", label(patch_id))
            }
            ValidationIssue::Invalid { patch_id, message } => {
                write!(f, "{}: {message}", label(patch_id))
            }
        }
    }
}
