use super::{EnvVar, Lines};
use serde::{Deserialize, Serialize};

/// An `azure-pipelines.yml` file, always in its fully nested stages form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzurePipelinesPipeline {
    pub path: String,
    pub name: String,
    pub trigger: Option<AzureTrigger>,
    pub pr: Option<AzureTrigger>,
    pub variables: Vec<EnvVar>,
    pub stages: Vec<AzureStage>,
    pub lines: Lines,
}

impl AzurePipelinesPipeline {
    pub fn is_valid(&self) -> bool {
        self.stages.iter().any(|stage| !stage.jobs.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AzureTrigger {
    pub disabled: bool,
    pub branches_include: Vec<String>,
    pub branches_exclude: Vec<String>,
    pub paths_include: Vec<String>,
    pub paths_exclude: Vec<String>,
    pub drafts: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureStage {
    pub stage: String,
    pub display_name: String,
    pub depends_on: Vec<String>,
    pub condition: String,
    pub template: String,
    pub jobs: Vec<AzureJob>,
    pub lines: Lines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureJob {
    pub job: String,
    /// Set for deployment jobs instead of `job`.
    pub deployment: String,
    pub display_name: String,
    pub depends_on: Vec<String>,
    pub condition: String,
    pub pool: Option<AzurePool>,
    pub template: String,
    pub steps: Vec<AzureStep>,
    pub lines: Lines,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzurePool {
    pub name: String,
    pub vm_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AzureStepKind {
    Script(String),
    Bash(String),
    Pwsh(String),
    Powershell(String),
    Checkout(String),
    Task(String),
    Template(String),
}

impl AzureStepKind {
    /// Inline shell text for the script-like kinds.
    pub fn script(&self) -> Option<&str> {
        match self {
            AzureStepKind::Script(s)
            | AzureStepKind::Bash(s)
            | AzureStepKind::Pwsh(s)
            | AzureStepKind::Powershell(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureStep {
    pub kind: AzureStepKind,
    pub display_name: String,
    pub condition: String,
    pub env: Vec<EnvVar>,
    pub inputs: Vec<EnvVar>,
    pub lines: Lines,
}
