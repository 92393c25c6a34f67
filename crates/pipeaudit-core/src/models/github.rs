use super::{EnvVar, Lines};
use serde::{Deserialize, Serialize};

/// Permission scopes a workflow or job can be granted.
pub const GITHUB_PERMISSION_SCOPES: &[&str] = &[
    "actions",
    "attestations",
    "checks",
    "contents",
    "deployments",
    "discussions",
    "id-token",
    "issues",
    "packages",
    "pages",
    "pull-requests",
    "repository-projects",
    "security-events",
    "statuses",
];

/// Secret name used when a job inherits every secret of its caller.
pub const INHERIT_ALL_SECRETS: &str = "*";

/// A workflow under `.github/workflows/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubActionsWorkflow {
    pub path: String,
    pub name: String,
    pub events: Vec<GithubActionsEvent>,
    pub permissions: Vec<GithubActionsPermission>,
    pub env: Vec<EnvVar>,
    pub jobs: Vec<GithubActionsJob>,
    pub lines: Lines,
}

impl GithubActionsWorkflow {
    pub fn is_valid(&self) -> bool {
        !self.jobs.is_empty() && !self.events.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GithubActionsEvent {
    pub name: String,
    pub types: Vec<String>,
    pub branches: Vec<String>,
    pub branches_ignore: Vec<String>,
    pub paths: Vec<String>,
    pub paths_ignore: Vec<String>,
    pub tags: Vec<String>,
    pub tags_ignore: Vec<String>,
    pub workflows: Vec<String>,
    pub cron: Vec<String>,
    pub inputs: Vec<GithubActionsInput>,
    pub lines: Lines,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubActionsPermission {
    pub scope: String,
    pub permission: String,
}

/// An input declared by a `workflow_dispatch`/`workflow_call` trigger or an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GithubActionsInput {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub default: String,
    pub input_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubActionsJob {
    pub id: String,
    pub name: String,
    /// Reusable workflow reference, for `uses:` jobs.
    pub uses: String,
    pub with: Vec<EnvVar>,
    pub secrets: Vec<EnvVar>,
    pub runs_on: Vec<String>,
    pub permissions: Vec<GithubActionsPermission>,
    pub needs: Vec<String>,
    pub condition: String,
    pub environment: Vec<GithubActionsEnvironment>,
    pub container: Option<GithubActionsContainer>,
    pub services: Vec<GithubActionsContainer>,
    pub outputs: Vec<EnvVar>,
    pub env: Vec<EnvVar>,
    pub steps: Vec<GithubActionsStep>,
    pub lines: Lines,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubActionsEnvironment {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubActionsContainer {
    /// Service id; empty for a job container.
    pub id: String,
    pub image: String,
    pub lines: Lines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubActionsStep {
    pub id: String,
    pub name: String,
    pub condition: String,
    pub env: Vec<EnvVar>,
    pub uses: String,
    /// Package identity of `uses`, empty for local actions.
    pub action: String,
    pub with: Vec<EnvVar>,
    pub run: String,
    pub shell: String,
    pub working_directory: String,
    pub lines: Lines,
}

/// An `action.yml` metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubActionsMetadata {
    pub path: String,
    pub name: String,
    pub author: String,
    pub description: String,
    pub inputs: Vec<GithubActionsInput>,
    pub outputs: Vec<EnvVar>,
    pub runs: GithubActionsRuns,
    pub lines: Lines,
}

impl GithubActionsMetadata {
    pub fn is_valid(&self) -> bool {
        !self.runs.using.is_empty()
    }

    pub fn is_composite(&self) -> bool {
        self.runs.using == "composite"
    }

    pub fn is_docker(&self) -> bool {
        self.runs.using == "docker"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GithubActionsRuns {
    pub using: String,
    pub main: String,
    pub pre: String,
    pub post: String,
    pub image: String,
    pub entrypoint: String,
    pub args: Vec<String>,
    pub env: Vec<EnvVar>,
    pub steps: Vec<GithubActionsStep>,
}
