pub mod azure;
pub mod github;
pub mod gitlab;
pub mod tekton;

pub use azure::*;
pub use github::*;
pub use gitlab::*;
pub use tekton::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source-line provenance for a modeled node: field name to 1-based line.
///
/// Every `Lines` has a `start` entry; it can only be built from one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lines(BTreeMap<String, usize>);

impl Lines {
    pub const START: &'static str = "start";

    pub fn new(start: usize) -> Self {
        let mut map = BTreeMap::new();
        map.insert(Self::START.to_string(), start);
        Self(map)
    }

    pub fn start(&self) -> usize {
        self.0.get(Self::START).copied().unwrap_or(1)
    }

    pub fn get(&self, field: &str) -> Option<usize> {
        self.0.get(field).copied()
    }

    /// Line for `field`, falling back to the node's start.
    pub fn line_of(&self, field: &str) -> usize {
        self.get(field).unwrap_or_else(|| self.start())
    }

    pub fn insert(&mut self, field: &str, line: usize) {
        self.0.insert(field.to_string(), line);
    }

    pub fn with(mut self, field: &str, line: Option<usize>) -> Self {
        if let Some(line) = line {
            self.insert(field, line);
        }
        self
    }
}

impl Default for Lines {
    fn default() -> Self {
        Self::new(1)
    }
}

/// A name/value pair such as an environment variable or an action input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    pub lines: Lines,
}

/// One scanned repository or directory and everything extracted from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInsights {
    pub purl: String,
    pub package_ecosystem: String,
    pub package_namespace: String,
    pub package_name: String,
    pub package_version: String,

    pub source_scm_type: String,
    pub source_git_repo: String,
    pub source_git_ref: String,
    pub source_git_commit_sha: String,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    pub build_dependencies: Vec<String>,
    pub package_dependencies: Vec<String>,

    pub github_actions_workflows: Vec<GithubActionsWorkflow>,
    pub github_actions_metadata: Vec<GithubActionsMetadata>,
    pub gitlabci_configs: Vec<GitlabciConfig>,
    pub azure_pipelines: Vec<AzurePipelinesPipeline>,
    pub pipeline_as_code_tekton: Vec<TektonPipelineRun>,
}

impl PackageInsights {
    /// A stub carrying identity and provenance, ready for scanning.
    pub fn new(purl: &crate::purl::Purl) -> Self {
        Self {
            purl: purl.to_string(),
            package_ecosystem: purl.purl_type.clone(),
            package_namespace: purl.namespace.clone(),
            package_name: purl.name.clone(),
            package_version: purl.version.clone(),
            ..Default::default()
        }
    }

    pub fn manifest_count(&self) -> usize {
        self.github_actions_workflows.len()
            + self.github_actions_metadata.len()
            + self.gitlabci_configs.len()
            + self.azure_pipelines.len()
            + self.pipeline_as_code_tekton.len()
    }
}
