use super::node::{self, Node, NodeKind};
use super::shape::{self, Decoded};
use super::{read_source, relative_path, ManifestParser};
use crate::error::{DecodeError, ScanError};
use crate::models::*;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Parser for Tekton pipeline-as-code under `.tekton/`.
///
/// A file may hold several documents; each `PipelineRun` or `Pipeline`
/// becomes its own record entry, anything else is ignored.
pub struct TektonParser;

fn tekton_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\.tekton/[^/]+\.ya?ml$").unwrap())
}

impl TektonParser {
    /// Decode every document in `content`.
    ///
    /// Only a YAML syntax error fails the whole file. A document that does
    /// not decode is logged and dropped, and the remaining documents are kept.
    pub fn decode(content: &str, path: &str) -> Decoded<Vec<TektonPipelineRun>> {
        let runs = node::load_all(content)?
            .iter()
            .filter(|doc| !doc.is_null())
            .filter_map(|doc| match decode_document(doc, path) {
                Ok(run) => Some(run),
                Err(e) => {
                    warn!(path, line = doc.line, error = %e, "skipping undecodable Tekton document");
                    None
                }
            })
            .collect();
        Ok(runs)
    }
}

impl ManifestParser for TektonParser {
    fn name(&self) -> &'static str {
        "tekton"
    }

    fn matches(&self, rel_path: &str) -> bool {
        tekton_pattern().is_match(rel_path)
    }

    fn parse(&self, file: &Path, root: &Path, package: &mut PackageInsights) -> Result<(), ScanError> {
        let rel = relative_path(file, root);
        let Some(content) = read_source(file)? else {
            return Ok(());
        };
        match Self::decode(&content, &rel) {
            Ok(runs) => {
                for run in runs {
                    if run.is_valid() {
                        package.pipeline_as_code_tekton.push(run);
                    } else {
                        debug!(path = %rel, kind = %run.kind, "skipping Tekton document");
                    }
                }
            }
            Err(e) => warn!(path = %rel, error = %e, "failed to decode Tekton document"),
        }
        Ok(())
    }
}

fn decode_document(doc: &Node, path: &str) -> Decoded<TektonPipelineRun> {
    if doc.as_mapping().is_none() {
        return Err(DecodeError::shape("document", "a mapping", doc));
    }

    let metadata = match shape::mapping("metadata", doc.get("metadata"))? {
        Some(metadata) => TektonMetadata {
            name: shape::scalar("metadata.name", metadata.get("name"))?,
            annotations: shape::env_vars("metadata.annotations", metadata.get("annotations"))?,
        },
        None => TektonMetadata::default(),
    };

    let kind = shape::scalar("kind", doc.get("kind"))?;
    let spec = shape::mapping("spec", doc.get("spec"))?;

    // A PipelineRun carries its pipeline inline or by reference; a Pipeline is the spec itself.
    let (pipeline_ref, pipeline) = match (kind.as_str(), spec) {
        ("PipelineRun", Some(spec)) => (
            decode_pipeline_ref(spec.get("pipelineRef"))?,
            shape::mapping("pipelineSpec", spec.get("pipelineSpec"))?,
        ),
        (_, spec) => (String::new(), spec),
    };

    let mut tasks = Vec::new();
    if let Some(pipeline) = pipeline {
        for task in shape::sequence("tasks", pipeline.get("tasks"))? {
            tasks.push(decode_task(task, false)?);
        }
        for task in shape::sequence("finally", pipeline.get("finally"))? {
            tasks.push(decode_task(task, true)?);
        }
    }

    Ok(TektonPipelineRun {
        path: path.to_string(),
        api_version: shape::scalar("apiVersion", doc.get("apiVersion"))?,
        kind,
        metadata,
        pipeline_ref,
        tasks,
        lines: Lines::new(doc.line)
            .with("kind", doc.key_line("kind"))
            .with("metadata", doc.key_line("metadata")),
    })
}

/// `pipelineRef:` by name, or by resolver rendered as `resolver:param=value,...`.
fn decode_pipeline_ref(node: Option<&Node>) -> Decoded<String> {
    let Some(node) = shape::mapping("pipelineRef", node)? else {
        return Ok(String::new());
    };
    let name = shape::scalar("pipelineRef.name", node.get("name"))?;
    if !name.is_empty() {
        return Ok(name);
    }
    let resolver = shape::scalar("pipelineRef.resolver", node.get("resolver"))?;
    let params = decode_params(node.get("params"))?
        .into_iter()
        .map(|p| format!("{}={}", p.name, p.value))
        .collect::<Vec<_>>()
        .join(",");
    Ok(format!("{}:{}", resolver, params))
}

/// Tekton params: a list of `{name, value}`, or a plain mapping.
fn decode_params(node: Option<&Node>) -> Decoded<Vec<EnvVar>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Null => Ok(Vec::new()),
        NodeKind::Mapping(_) => shape::env_vars("params", Some(node)),
        NodeKind::Sequence(items) => items
            .iter()
            .map(|item| {
                if item.as_mapping().is_none() {
                    return Err(DecodeError::shape("params", "a list of {name, value}", item));
                }
                Ok(EnvVar {
                    name: shape::scalar("params.name", item.get("name"))?,
                    value: item.get("value").map(Node::render).unwrap_or_default(),
                    lines: Lines::new(item.line),
                })
            })
            .collect(),
        _ => Err(DecodeError::shape("params", "a list or a mapping", node)),
    }
}

fn decode_task(task: &Node, finally: bool) -> Decoded<TektonTask> {
    if task.as_mapping().is_none() {
        return Err(DecodeError::shape("tasks", "a task mapping", task));
    }

    let task_ref = match shape::mapping("taskRef", task.get("taskRef"))? {
        Some(task_ref) => Some(TektonTaskRef {
            name: shape::scalar("taskRef.name", task_ref.get("name"))?,
            kind: shape::scalar("taskRef.kind", task_ref.get("kind"))?,
            resolver: shape::scalar("taskRef.resolver", task_ref.get("resolver"))?,
            params: decode_params(task_ref.get("params"))?,
        }),
        None => None,
    };

    let steps = match shape::mapping("taskSpec", task.get("taskSpec"))? {
        Some(spec) => shape::sequence("taskSpec.steps", spec.get("steps"))?
            .iter()
            .map(decode_step)
            .collect::<Decoded<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(TektonTask {
        name: shape::scalar("name", task.get("name"))?,
        task_ref,
        run_after: shape::string_list("runAfter", task.get("runAfter"))?,
        finally,
        steps,
        lines: Lines::new(task.line).with("taskRef", task.key_line("taskRef")),
    })
}

fn decode_step(step: &Node) -> Decoded<TektonStep> {
    if step.as_mapping().is_none() {
        return Err(DecodeError::shape("steps", "a step mapping", step));
    }
    Ok(TektonStep {
        name: shape::scalar("name", step.get("name"))?,
        image: shape::scalar("image", step.get("image"))?,
        script: shape::scalar("script", step.get("script"))?,
        command: shape::string_list("command", step.get("command"))?,
        args: shape::string_list("args", step.get("args"))?,
        lines: Lines::new(step.line)
            .with("image", step.key_line("image"))
            .with("script", step.key_line("script")),
    })
}
