//! The `angular.json` workspace description.
//!
//! Loaded once by the caller and passed down explicitly; nothing in the engine
//! reads it behind the caller's back.

use crate::host::{Host, HostError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const WORKSPACE_FILE: &str = "angular.json";

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("could not find workspace configuration at {}", .path.display())]
    Missing { path: PathBuf },

    #[error("invalid workspace configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not find project ({name}) in workspace{}", .suggestion.as_ref().map(|s| format!("; did you mean '{s}'?")).unwrap_or_default())]
    UnknownProject {
        name: String,
        suggestion: Option<String>,
    },

    #[error("workspace has no default project")]
    NoDefaultProject,

    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub new_project_root: Option<String>,
    #[serde(default)]
    pub default_project: Option<String>,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Application,
    Library,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub source_root: Option<String>,
    #[serde(default)]
    pub project_type: Option<ProjectType>,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl ProjectConfig {
    /// `sourceRoot`, or `<root>/src` when it is not set.
    pub fn source_root(&self) -> PathBuf {
        match &self.source_root {
            Some(source_root) => PathBuf::from(source_root),
            None => Path::new(&self.root).join("src"),
        }
    }

    /// `<sourceRoot>/app`, where generated code lands.
    pub fn app_dir(&self) -> PathBuf {
        self.source_root().join("app")
    }
}

impl WorkspaceConfig {
    pub fn parse(input: &str) -> Result<Self, WorkspaceError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Read `angular.json` at the root of `host`.
    pub fn load<H: Host + ?Sized>(host: &H) -> Result<Self, WorkspaceError> {
        let path = Path::new(WORKSPACE_FILE);
        let contents = host.read(path)?.ok_or_else(|| WorkspaceError::Missing {
            path: path.to_path_buf(),
        })?;
        Self::parse(&contents)
    }

    pub fn project(&self, name: &str) -> Result<&ProjectConfig, WorkspaceError> {
        self.projects
            .get(name)
            .ok_or_else(|| WorkspaceError::UnknownProject {
                name: name.to_string(),
                suggestion: self.closest_project(name),
            })
    }

    /// The project named `name`, or the default project.
    pub fn project_or_default(
        &self,
        name: Option<&str>,
    ) -> Result<(&str, &ProjectConfig), WorkspaceError> {
        let name = match name {
            Some(name) => name,
            None => self
                .default_project
                .as_deref()
                .ok_or(WorkspaceError::NoDefaultProject)?,
        };
        let (key, project) = self
            .projects
            .get_key_value(name)
            .ok_or_else(|| WorkspaceError::UnknownProject {
                name: name.to_string(),
                suggestion: self.closest_project(name),
            })?;
        Ok((key.as_str(), project))
    }

    fn closest_project(&self, name: &str) -> Option<String> {
        self.projects
            .keys()
            .map(|candidate| (strsim::jaro_winkler(name, candidate), candidate))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    const ANGULAR_JSON: &str = r#"{
  "version": 1,
  "newProjectRoot": "projects",
  "defaultProject": "styleguide",
  "projects": {
    "styleguide": {
      "root": "",
      "sourceRoot": "src",
      "projectType": "application",
      "prefix": "app"
    },
    "atoms": {
      "root": "projects/atoms",
      "projectType": "library",
      "prefix": "a"
    }
  }
}"#;

    #[test]
    fn loads_projects_through_host() {
        let mut host = MemoryHost::new();
        host.insert("angular.json", ANGULAR_JSON);
        let workspace = WorkspaceConfig::load(&host).unwrap();

        let app = workspace.project("styleguide").unwrap();
        assert_eq!(app.source_root(), PathBuf::from("src"));
        assert_eq!(app.app_dir(), PathBuf::from("src/app"));
        assert_eq!(app.project_type, Some(ProjectType::Application));

        let lib = workspace.project("atoms").unwrap();
        assert_eq!(lib.source_root(), PathBuf::from("projects/atoms/src"));
        assert_eq!(lib.prefix.as_deref(), Some("a"));
    }

    #[test]
    fn default_project() {
        let workspace = WorkspaceConfig::parse(ANGULAR_JSON).unwrap();
        let (name, _) = workspace.project_or_default(None).unwrap();
        assert_eq!(name, "styleguide");

        let bare = WorkspaceConfig::parse(r#"{ "projects": {} }"#).unwrap();
        assert!(matches!(
            bare.project_or_default(None),
            Err(WorkspaceError::NoDefaultProject)
        ));
    }

    #[test]
    fn unknown_project_suggests_closest() {
        let workspace = WorkspaceConfig::parse(ANGULAR_JSON).unwrap();
        let err = workspace.project("styleguid").unwrap_err();
        assert!(matches!(
            &err,
            WorkspaceError::UnknownProject { suggestion: Some(s), .. } if s == "styleguide"
        ));
        assert!(err.to_string().contains("did you mean 'styleguide'"));

        let err = workspace.project("zzz").unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::UnknownProject { suggestion: None, .. }
        ));
    }

    #[test]
    fn missing_workspace_file() {
        let host = MemoryHost::new();
        assert!(matches!(
            WorkspaceConfig::load(&host),
            Err(WorkspaceError::Missing { .. })
        ));
    }
}
