use super::node::{self, Node, NodeKind};
use super::shape::{self, Decoded};
use super::{read_source, relative_path, ManifestParser};
use crate::error::{DecodeError, ScanError};
use crate::models::*;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Parser for Azure Pipelines YAML (`azure-pipelines.yml`, `azure-pipelines-*.yml`).
///
/// Supported constructs:
/// - stages -> jobs -> steps, plus the top-level `jobs:` and `steps:` shorthands
/// - regular and deployment jobs (steps under `strategy` lifecycle hooks)
/// - template references at stage, job and step level
pub struct AzurePipelinesParser;

/// Step keys that select the step kind. Exactly one must be present.
const STEP_KINDS: &[&str] = &["script", "bash", "pwsh", "powershell", "checkout", "task", "template"];

const DEPLOY_STRATEGIES: &[&str] = &["runOnce", "rolling", "canary"];
const DEPLOY_HOOKS: &[&str] = &["preDeploy", "deploy", "routeTraffic", "postRouteTraffic"];

fn pipeline_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.?azure-pipelines(-.+)?\.ya?ml$").unwrap())
}

impl AzurePipelinesParser {
    /// Decode Azure Pipelines YAML into its fully nested stages form.
    pub fn decode(content: &str, path: &str) -> Decoded<AzurePipelinesPipeline> {
        let doc = node::load(content)?;
        if doc.as_mapping().is_none() {
            return Err(DecodeError::shape("pipeline", "a mapping", &doc));
        }

        let stages = if let Some(stages) = doc.get("stages") {
            shape::sequence("stages", Some(stages))?
                .iter()
                .map(decode_stage)
                .collect::<Decoded<Vec<_>>>()?
        } else if let Some((key, jobs)) = doc.entry("jobs") {
            // Top-level jobs live in one implicit stage.
            vec![AzureStage {
                stage: String::new(),
                display_name: String::new(),
                depends_on: Vec::new(),
                condition: String::new(),
                template: String::new(),
                jobs: shape::sequence("jobs", Some(jobs))?
                    .iter()
                    .map(decode_job)
                    .collect::<Decoded<Vec<_>>>()?,
                lines: Lines::new(key.line),
            }]
        } else if let Some((key, steps)) = doc.entry("steps") {
            // Top-level steps live in one implicit job of one implicit stage.
            let job = AzureJob {
                job: String::new(),
                deployment: String::new(),
                display_name: String::new(),
                depends_on: Vec::new(),
                condition: String::new(),
                pool: decode_pool(doc.get("pool"))?,
                template: String::new(),
                steps: decode_steps(Some(steps))?,
                lines: Lines::new(key.line),
            };
            vec![AzureStage {
                stage: String::new(),
                display_name: String::new(),
                depends_on: Vec::new(),
                condition: String::new(),
                template: String::new(),
                jobs: vec![job],
                lines: Lines::new(key.line),
            }]
        } else {
            Vec::new()
        };

        Ok(AzurePipelinesPipeline {
            path: path.to_string(),
            name: shape::scalar("name", doc.get("name"))?,
            trigger: decode_trigger("trigger", doc.get("trigger"))?,
            pr: decode_trigger("pr", doc.get("pr"))?,
            variables: decode_variables(doc.get("variables"))?,
            stages,
            lines: Lines::new(doc.line)
                .with("trigger", doc.key_line("trigger"))
                .with("pr", doc.key_line("pr"))
                .with("variables", doc.key_line("variables")),
        })
    }
}

impl ManifestParser for AzurePipelinesParser {
    fn name(&self) -> &'static str {
        "azure-pipelines"
    }

    fn matches(&self, rel_path: &str) -> bool {
        pipeline_pattern().is_match(rel_path)
    }

    fn parse(&self, file: &Path, root: &Path, package: &mut PackageInsights) -> Result<(), ScanError> {
        let rel = relative_path(file, root);
        let Some(content) = read_source(file)? else {
            return Ok(());
        };
        match Self::decode(&content, &rel) {
            Ok(pipeline) if pipeline.is_valid() => package.azure_pipelines.push(pipeline),
            Ok(_) => debug!(path = %rel, "skipping Azure pipeline without jobs"),
            Err(e) => warn!(path = %rel, error = %e, "failed to decode Azure pipeline"),
        }
        Ok(())
    }
}

/// `trigger:`/`pr:` as `none`, a branch, a branch list or a filter mapping.
fn decode_trigger(field: &str, node: Option<&Node>) -> Decoded<Option<AzureTrigger>> {
    let Some(node) = node else {
        return Ok(None);
    };
    match &node.kind {
        NodeKind::Null => Ok(None),
        NodeKind::Str(s) if s == "none" => Ok(Some(AzureTrigger {
            disabled: true,
            ..Default::default()
        })),
        NodeKind::Bool(enabled) => Ok(Some(AzureTrigger {
            disabled: !enabled,
            ..Default::default()
        })),
        NodeKind::Str(_) | NodeKind::Sequence(_) => Ok(Some(AzureTrigger {
            branches_include: shape::string_list(field, Some(node))?,
            ..Default::default()
        })),
        NodeKind::Mapping(_) => {
            let (branches_include, branches_exclude) = include_exclude(field, node.get("branches"))?;
            let (paths_include, paths_exclude) = include_exclude(field, node.get("paths"))?;
            let drafts = match node.get("drafts") {
                Some(drafts) => Some(shape::bool_flag("drafts", Some(drafts))?),
                None => None,
            };
            Ok(Some(AzureTrigger {
                disabled: false,
                branches_include,
                branches_exclude,
                paths_include,
                paths_exclude,
                drafts,
            }))
        }
        _ => Err(DecodeError::shape(field, "none, a branch list or a mapping", node)),
    }
}

/// A filter given either as a plain list (include only) or as `{include, exclude}`.
fn include_exclude(field: &str, node: Option<&Node>) -> Decoded<(Vec<String>, Vec<String>)> {
    match node {
        Some(n) if n.as_mapping().is_some() => Ok((
            shape::string_list(field, n.get("include"))?,
            shape::string_list(field, n.get("exclude"))?,
        )),
        _ => Ok((shape::string_list(field, node)?, Vec::new())),
    }
}

/// `variables:` as a name/value mapping or a list of `{name, value}`, `{group}` and `{template}`.
fn decode_variables(node: Option<&Node>) -> Decoded<Vec<EnvVar>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Null => Ok(Vec::new()),
        NodeKind::Mapping(_) => node
            .entries()
            .map(|(name, key, value)| {
                let value = match &value.kind {
                    NodeKind::Mapping(_) => shape::scalar("variables.value", value.get("value"))?,
                    _ => shape::scalar("variables", Some(value))?,
                };
                Ok(EnvVar {
                    name,
                    value,
                    lines: Lines::new(key.line),
                })
            })
            .collect(),
        NodeKind::Sequence(items) => items
            .iter()
            .map(|item| {
                if item.as_mapping().is_none() {
                    return Err(DecodeError::shape("variables", "a list of mappings", item));
                }
                let (name, value) = if let Some(group) = item.get("group") {
                    ("group".to_string(), shape::scalar("variables.group", Some(group))?)
                } else if let Some(template) = item.get("template") {
                    ("template".to_string(), shape::scalar("variables.template", Some(template))?)
                } else {
                    (
                        shape::scalar("variables.name", item.get("name"))?,
                        shape::scalar("variables.value", item.get("value"))?,
                    )
                };
                Ok(EnvVar {
                    name,
                    value,
                    lines: Lines::new(item.line),
                })
            })
            .collect(),
        _ => Err(DecodeError::shape("variables", "a mapping or a list", node)),
    }
}

fn decode_pool(node: Option<&Node>) -> Decoded<Option<AzurePool>> {
    let Some(node) = node else {
        return Ok(None);
    };
    match &node.kind {
        NodeKind::Null => Ok(None),
        NodeKind::Str(name) => Ok(Some(AzurePool {
            name: name.clone(),
            vm_image: String::new(),
        })),
        NodeKind::Mapping(_) => Ok(Some(AzurePool {
            name: shape::scalar("pool.name", node.get("name"))?,
            vm_image: shape::scalar("pool.vmImage", node.get("vmImage"))?,
        })),
        _ => Err(DecodeError::shape("pool", "a name or a mapping", node)),
    }
}

fn decode_stage(stage: &Node) -> Decoded<AzureStage> {
    if stage.as_mapping().is_none() {
        return Err(DecodeError::shape("stages", "a stage mapping", stage));
    }
    Ok(AzureStage {
        stage: shape::scalar("stage", stage.get("stage"))?,
        display_name: shape::scalar("displayName", stage.get("displayName"))?,
        depends_on: shape::string_list("dependsOn", stage.get("dependsOn"))?,
        condition: shape::condition("condition", stage.get("condition"))?,
        template: shape::scalar("template", stage.get("template"))?,
        jobs: shape::sequence("jobs", stage.get("jobs"))?
            .iter()
            .map(decode_job)
            .collect::<Decoded<Vec<_>>>()?,
        lines: Lines::new(stage.line).with("condition", stage.key_line("condition")),
    })
}

fn decode_job(job: &Node) -> Decoded<AzureJob> {
    if job.as_mapping().is_none() {
        return Err(DecodeError::shape("jobs", "a job mapping", job));
    }

    let deployment = shape::scalar("deployment", job.get("deployment"))?;
    let mut steps = decode_steps(job.get("steps"))?;
    if !deployment.is_empty() {
        steps.extend(deployment_steps(job)?);
    }

    Ok(AzureJob {
        job: shape::scalar("job", job.get("job"))?,
        deployment,
        display_name: shape::scalar("displayName", job.get("displayName"))?,
        depends_on: shape::string_list("dependsOn", job.get("dependsOn"))?,
        condition: shape::condition("condition", job.get("condition"))?,
        pool: decode_pool(job.get("pool"))?,
        template: shape::scalar("template", job.get("template"))?,
        steps,
        lines: Lines::new(job.line)
            .with("pool", job.key_line("pool"))
            .with("condition", job.key_line("condition")),
    })
}

/// Steps of every lifecycle hook of a deployment job's strategy, in hook order.
fn deployment_steps(job: &Node) -> Decoded<Vec<AzureStep>> {
    let mut steps = Vec::new();
    let Some(strategy) = shape::mapping("strategy", job.get("strategy"))? else {
        return Ok(steps);
    };
    for name in DEPLOY_STRATEGIES {
        let Some(strategy) = shape::mapping(name, strategy.get(name))? else {
            continue;
        };
        for hook in DEPLOY_HOOKS {
            if let Some(hook) = shape::mapping(hook, strategy.get(hook))? {
                steps.extend(decode_steps(hook.get("steps"))?);
            }
        }
        if let Some(on) = shape::mapping("on", strategy.get("on"))? {
            for outcome in ["success", "failure"] {
                if let Some(outcome) = shape::mapping(outcome, on.get(outcome))? {
                    steps.extend(decode_steps(outcome.get("steps"))?);
                }
            }
        }
    }
    Ok(steps)
}

fn decode_steps(node: Option<&Node>) -> Decoded<Vec<AzureStep>> {
    shape::sequence("steps", node)?.iter().map(decode_step).collect()
}

fn decode_step(step: &Node) -> Decoded<AzureStep> {
    if step.as_mapping().is_none() {
        return Err(DecodeError::shape("steps", "a step mapping", step));
    }

    let present: Vec<&str> = STEP_KINDS
        .iter()
        .copied()
        .filter(|key| step.get(key).is_some())
        .collect();
    let key = match present.as_slice() {
        [key] => *key,
        [] => {
            return Err(DecodeError::shape(
                "steps",
                "a script, bash, pwsh, powershell, checkout, task or template step",
                step,
            ))
        }
        _ => {
            return Err(DecodeError::Value {
                field: "steps".to_string(),
                value: present.join(", "),
                line: step.line,
            })
        }
    };

    let value = shape::scalar(key, step.get(key))?;
    let kind = match key {
        "script" => AzureStepKind::Script(value),
        "bash" => AzureStepKind::Bash(value),
        "pwsh" => AzureStepKind::Pwsh(value),
        "powershell" => AzureStepKind::Powershell(value),
        "checkout" => AzureStepKind::Checkout(value),
        "task" => AzureStepKind::Task(value),
        _ => AzureStepKind::Template(value),
    };

    Ok(AzureStep {
        kind,
        display_name: shape::scalar("displayName", step.get("displayName"))?,
        condition: shape::condition("condition", step.get("condition"))?,
        env: shape::env_vars("env", step.get("env"))?,
        inputs: shape::env_vars("inputs", step.get("inputs"))?,
        lines: Lines::new(step.line)
            .with(key, step.key_line(key))
            .with("condition", step.key_line("condition")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_staged_pipeline() {
        let yaml = r#"
name: CI
trigger:
  branches:
    include: [main]
    exclude: [experimental/*]
pr: none
variables:
  - name: configuration
    value: Release
  - group: shared-secrets
stages:
  - stage: Build
    jobs:
      - job: Compile
        pool:
          vmImage: ubuntu-latest
        steps:
          - checkout: self
          - task: DotNetCoreCLI@2
            inputs:
              command: build
          - script: dotnet test
            displayName: Test
  - stage: Deploy
    dependsOn: Build
    condition: succeeded()
    jobs:
      - template: jobs/deploy.yml
"#;
        let pipeline = AzurePipelinesParser::decode(yaml, "azure-pipelines.yml").unwrap();
        assert!(pipeline.is_valid());
        assert_eq!(pipeline.name, "CI");

        let trigger = pipeline.trigger.as_ref().unwrap();
        assert_eq!(trigger.branches_include, vec!["main"]);
        assert_eq!(trigger.branches_exclude, vec!["experimental/*"]);
        assert!(pipeline.pr.as_ref().unwrap().disabled);

        assert_eq!(pipeline.variables[0].name, "configuration");
        assert_eq!(pipeline.variables[0].value, "Release");
        assert_eq!(pipeline.variables[1].name, "group");
        assert_eq!(pipeline.variables[1].value, "shared-secrets");

        let build = &pipeline.stages[0];
        assert_eq!(build.stage, "Build");
        assert_eq!(build.lines.start(), 13);
        let compile = &build.jobs[0];
        assert_eq!(compile.pool.as_ref().unwrap().vm_image, "ubuntu-latest");
        assert_eq!(compile.steps[0].kind, AzureStepKind::Checkout("self".into()));
        assert_eq!(compile.steps[1].kind, AzureStepKind::Task("DotNetCoreCLI@2".into()));
        assert_eq!(compile.steps[1].inputs[0].value, "build");
        assert_eq!(compile.steps[2].kind.script(), Some("dotnet test"));
        assert_eq!(compile.steps[2].lines.get("script"), Some(23));

        let deploy = &pipeline.stages[1];
        assert_eq!(deploy.depends_on, vec!["Build"]);
        assert_eq!(deploy.condition, "succeeded()");
        assert_eq!(deploy.jobs[0].template, "jobs/deploy.yml");
    }

    #[test]
    fn test_steps_shorthand_equals_nested_form() {
        let shorthand =
            AzurePipelinesParser::decode("steps: [bash: asdf]", "azure-pipelines.yml").unwrap();
        let braced =
            AzurePipelinesParser::decode("steps: [{bash: asdf}]", "azure-pipelines.yml").unwrap();
        let nested = AzurePipelinesParser::decode(
            "stages: [{jobs: [{steps: [bash: asdf]}]}]",
            "azure-pipelines.yml",
        )
        .unwrap();
        assert_eq!(shorthand, braced);
        assert_eq!(shorthand, nested);
        assert_eq!(
            shorthand.stages[0].jobs[0].steps[0].kind,
            AzureStepKind::Bash("asdf".into())
        );
    }

    #[test]
    fn test_jobs_shorthand_is_lifted_into_one_stage() {
        let yaml = "jobs:\n- job: A\n  steps:\n  - pwsh: Write-Host hi\n- job: B\n  dependsOn: [A]\n  steps:\n  - powershell: dir\n";
        let pipeline = AzurePipelinesParser::decode(yaml, "azure-pipelines.yml").unwrap();
        assert_eq!(pipeline.stages.len(), 1);
        assert_eq!(pipeline.stages[0].jobs.len(), 2);
        assert_eq!(pipeline.stages[0].jobs[1].depends_on, vec!["A"]);
        assert_eq!(pipeline.stages[0].jobs[1].lines.start(), 5);
    }

    #[test]
    fn test_deployment_job_steps() {
        let yaml = r#"
jobs:
  - deployment: Web
    environment: prod
    strategy:
      runOnce:
        deploy:
          steps:
            - script: ./deploy.sh
        on:
          failure:
            steps:
              - script: ./rollback.sh
"#;
        let pipeline = AzurePipelinesParser::decode(yaml, "azure-pipelines.yml").unwrap();
        let job = &pipeline.stages[0].jobs[0];
        assert_eq!(job.deployment, "Web");
        let scripts: Vec<_> = job.steps.iter().filter_map(|s| s.kind.script()).collect();
        assert_eq!(scripts, vec!["./deploy.sh", "./rollback.sh"]);
    }

    #[test]
    fn test_step_kinds_are_exclusive() {
        assert!(AzurePipelinesParser::decode("steps: [{bash: a, script: b}]", "a.yml").is_err());
        assert!(AzurePipelinesParser::decode("steps: [{displayName: x}]", "a.yml").is_err());
        assert!(AzurePipelinesParser::decode("steps: [x]", "a.yml").is_err());
    }

    #[test]
    fn test_pipeline_without_jobs_is_invalid() {
        let pipeline = AzurePipelinesParser::decode("trigger: [main]\n", "a.yml").unwrap();
        assert!(!pipeline.is_valid());
        assert_eq!(pipeline.trigger.unwrap().branches_include, vec!["main"]);
    }

    #[test]
    fn test_path_pattern() {
        let parser = AzurePipelinesParser;
        assert!(parser.matches("azure-pipelines.yml"));
        assert!(parser.matches(".azure-pipelines.yaml"));
        assert!(parser.matches("ci/azure-pipelines-release.yml"));
        assert!(!parser.matches("azure-pipelines.json"));
    }
}
