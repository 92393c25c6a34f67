use super::{EnvVar, Lines};
use serde::{Deserialize, Serialize};

/// A Tekton `PipelineRun` (or `Pipeline`) under `.tekton/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TektonPipelineRun {
    pub path: String,
    pub api_version: String,
    pub kind: String,
    pub metadata: TektonMetadata,
    pub pipeline_ref: String,
    pub tasks: Vec<TektonTask>,
    pub lines: Lines,
}

impl TektonPipelineRun {
    pub fn is_valid(&self) -> bool {
        matches!(self.kind.as_str(), "PipelineRun" | "Pipeline")
            && (!self.tasks.is_empty() || !self.pipeline_ref.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TektonMetadata {
    pub name: String,
    pub annotations: Vec<EnvVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TektonTask {
    pub name: String,
    pub task_ref: Option<TektonTaskRef>,
    pub run_after: Vec<String>,
    /// Set for tasks listed under `finally`.
    pub finally: bool,
    pub steps: Vec<TektonStep>,
    pub lines: Lines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TektonTaskRef {
    pub name: String,
    pub kind: String,
    pub resolver: String,
    pub params: Vec<EnvVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TektonStep {
    pub name: String,
    pub image: String,
    pub script: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub lines: Lines,
}
