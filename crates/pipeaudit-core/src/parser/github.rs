use super::node::{self, Node, NodeKind};
use super::shape::{self, Decoded};
use super::{read_source, relative_path, ManifestParser};
use crate::error::{DecodeError, ScanError};
use crate::models::*;
use crate::purl::Purl;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Parser for GitHub Actions workflow files under `.github/workflows/`.
pub struct GitHubActionsParser;

/// Parser for `action.yml` / `action.yaml` metadata files anywhere in the tree.
pub struct GitHubActionMetadataParser;

fn workflow_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\.github/workflows/[^/]+\.ya?ml$").unwrap())
}

fn metadata_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(^|/)action\.ya?ml$").unwrap())
}

impl GitHubActionsParser {
    /// Decode workflow YAML into a workflow document.
    pub fn decode(content: &str, path: &str) -> Decoded<GithubActionsWorkflow> {
        let doc = node::load(content)?;
        if doc.as_mapping().is_none() {
            return Err(DecodeError::shape("workflow", "a mapping", &doc));
        }

        let events = match doc.get("on") {
            Some(on) => decode_events(on)?,
            None => Vec::new(),
        };

        let jobs = match shape::mapping("jobs", doc.get("jobs"))? {
            Some(jobs) => jobs
                .entries()
                .map(|(id, key, job)| decode_job(&id, key.line, job))
                .collect::<Decoded<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(GithubActionsWorkflow {
            path: path.to_string(),
            name: shape::scalar("name", doc.get("name"))?,
            events,
            permissions: decode_permissions(doc.get("permissions"))?,
            env: shape::env_vars("env", doc.get("env"))?,
            jobs,
            lines: Lines::new(doc.line)
                .with("name", doc.key_line("name"))
                .with("on", doc.key_line("on"))
                .with("permissions", doc.key_line("permissions")),
        })
    }
}

impl ManifestParser for GitHubActionsParser {
    fn name(&self) -> &'static str {
        "github-actions-workflow"
    }

    fn matches(&self, rel_path: &str) -> bool {
        workflow_pattern().is_match(rel_path)
    }

    fn parse(&self, file: &Path, root: &Path, package: &mut PackageInsights) -> Result<(), ScanError> {
        let rel = relative_path(file, root);
        let Some(content) = read_source(file)? else {
            return Ok(());
        };
        match Self::decode(&content, &rel) {
            Ok(workflow) if workflow.is_valid() => package.github_actions_workflows.push(workflow),
            Ok(_) => debug!(path = %rel, "skipping workflow without jobs or triggers"),
            Err(e) => warn!(path = %rel, error = %e, "failed to decode workflow"),
        }
        Ok(())
    }
}

impl GitHubActionMetadataParser {
    /// Decode `action.yml` content into an action metadata document.
    pub fn decode(content: &str, path: &str) -> Decoded<GithubActionsMetadata> {
        let doc = node::load(content)?;
        if doc.as_mapping().is_none() {
            return Err(DecodeError::shape("action", "a mapping", &doc));
        }

        let inputs = match shape::mapping("inputs", doc.get("inputs"))? {
            Some(inputs) => decode_inputs(inputs)?,
            None => Vec::new(),
        };

        let outputs = match shape::mapping("outputs", doc.get("outputs"))? {
            Some(outputs) => outputs
                .entries()
                .map(|(name, key, output)| {
                    let value = match &output.kind {
                        NodeKind::Mapping(_) => shape::scalar("outputs.value", output.get("value"))?,
                        _ => shape::scalar("outputs", Some(output))?,
                    };
                    Ok(EnvVar {
                        name,
                        value,
                        lines: Lines::new(key.line),
                    })
                })
                .collect::<Decoded<Vec<_>>>()?,
            None => Vec::new(),
        };

        let runs = match shape::mapping("runs", doc.get("runs"))? {
            Some(runs) => GithubActionsRuns {
                using: shape::scalar("runs.using", runs.get("using"))?,
                main: shape::scalar("runs.main", runs.get("main"))?,
                pre: shape::scalar("runs.pre", runs.get("pre"))?,
                post: shape::scalar("runs.post", runs.get("post"))?,
                image: shape::scalar("runs.image", runs.get("image"))?,
                entrypoint: shape::scalar("runs.entrypoint", runs.get("entrypoint"))?,
                args: shape::string_list("runs.args", runs.get("args"))?,
                env: shape::env_vars("runs.env", runs.get("env"))?,
                steps: shape::sequence("runs.steps", runs.get("steps"))?
                    .iter()
                    .map(decode_step)
                    .collect::<Decoded<Vec<_>>>()?,
            },
            None => GithubActionsRuns::default(),
        };

        Ok(GithubActionsMetadata {
            path: path.to_string(),
            name: shape::scalar("name", doc.get("name"))?,
            author: shape::scalar("author", doc.get("author"))?,
            description: shape::scalar("description", doc.get("description"))?,
            inputs,
            outputs,
            runs,
            lines: Lines::new(doc.line).with("runs", doc.key_line("runs")),
        })
    }
}

impl ManifestParser for GitHubActionMetadataParser {
    fn name(&self) -> &'static str {
        "github-action-metadata"
    }

    fn matches(&self, rel_path: &str) -> bool {
        metadata_pattern().is_match(rel_path)
    }

    fn parse(&self, file: &Path, root: &Path, package: &mut PackageInsights) -> Result<(), ScanError> {
        let rel = relative_path(file, root);
        let Some(content) = read_source(file)? else {
            return Ok(());
        };
        match Self::decode(&content, &rel) {
            Ok(action) if action.is_valid() => package.github_actions_metadata.push(action),
            Ok(_) => debug!(path = %rel, "skipping action metadata without runs.using"),
            Err(e) => warn!(path = %rel, error = %e, "failed to decode action metadata"),
        }
        Ok(())
    }
}

fn decode_events(on: &Node) -> Decoded<Vec<GithubActionsEvent>> {
    match &on.kind {
        NodeKind::Str(name) => Ok(vec![event(name, on.line)]),
        NodeKind::Sequence(items) => items
            .iter()
            .map(|item| match item.as_str() {
                Some(name) => Ok(event(name, item.line)),
                None => Err(DecodeError::shape("on", "a list of event names", item)),
            })
            .collect(),
        NodeKind::Mapping(_) => on
            .entries()
            .map(|(name, key, config)| decode_event_config(&name, key.line, config))
            .collect(),
        _ => Err(DecodeError::shape("on", "an event, a list or a mapping", on)),
    }
}

fn event(name: &str, line: usize) -> GithubActionsEvent {
    GithubActionsEvent {
        name: name.to_string(),
        lines: Lines::new(line),
        ..Default::default()
    }
}

fn decode_event_config(name: &str, line: usize, config: &Node) -> Decoded<GithubActionsEvent> {
    let mut ev = event(name, line);
    match &config.kind {
        NodeKind::Null => {}
        NodeKind::Mapping(_) => {
            ev.types = shape::string_list("types", config.get("types"))?;
            ev.branches = shape::string_list("branches", config.get("branches"))?;
            ev.branches_ignore = shape::string_list("branches-ignore", config.get("branches-ignore"))?;
            ev.paths = shape::string_list("paths", config.get("paths"))?;
            ev.paths_ignore = shape::string_list("paths-ignore", config.get("paths-ignore"))?;
            ev.tags = shape::string_list("tags", config.get("tags"))?;
            ev.tags_ignore = shape::string_list("tags-ignore", config.get("tags-ignore"))?;
            ev.workflows = shape::string_list("workflows", config.get("workflows"))?;
            if let Some(inputs) = shape::mapping("inputs", config.get("inputs"))? {
                ev.inputs = decode_inputs(inputs)?;
            }
        }
        // schedule: [{cron: "..."}]
        NodeKind::Sequence(items) => {
            for item in items {
                let cron = shape::scalar("cron", item.get("cron"))?;
                if !cron.is_empty() {
                    ev.cron.push(cron);
                }
            }
        }
        _ => return Err(DecodeError::shape(name, "a mapping or a list", config)),
    }
    Ok(ev)
}

fn decode_inputs(inputs: &Node) -> Decoded<Vec<GithubActionsInput>> {
    inputs
        .entries()
        .map(|(name, _, input)| {
            if input.is_null() {
                return Ok(GithubActionsInput {
                    name,
                    ..Default::default()
                });
            }
            if input.as_mapping().is_none() {
                return Err(DecodeError::shape("inputs", "a mapping", input));
            }
            Ok(GithubActionsInput {
                name,
                description: shape::scalar("description", input.get("description"))?,
                required: shape::bool_flag("required", input.get("required"))?,
                default: shape::scalar("default", input.get("default"))?,
                input_type: shape::scalar("type", input.get("type"))?,
            })
        })
        .collect()
}

/// `permissions:` as a shorthand keyword or a per-scope mapping.
pub(crate) fn decode_permissions(node: Option<&Node>) -> Decoded<Vec<GithubActionsPermission>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Null => Ok(Vec::new()),
        NodeKind::Str(keyword) => {
            let level = match keyword.as_str() {
                "read-all" => "read",
                "write-all" => "write",
                _ => {
                    return Err(DecodeError::Value {
                        field: "permissions".to_string(),
                        value: keyword.clone(),
                        line: node.line,
                    })
                }
            };
            Ok(GITHUB_PERMISSION_SCOPES
                .iter()
                .map(|scope| GithubActionsPermission {
                    scope: scope.to_string(),
                    permission: level.to_string(),
                })
                .collect())
        }
        NodeKind::Mapping(_) => node
            .entries()
            .map(|(scope, _, level)| {
                Ok(GithubActionsPermission {
                    scope,
                    permission: shape::scalar("permissions", Some(level))?,
                })
            })
            .collect(),
        _ => Err(DecodeError::shape("permissions", "a keyword or a mapping", node)),
    }
}

/// `runs-on:` as one label, a list of labels or a `{group, labels}` object.
pub(crate) fn decode_runs_on(node: Option<&Node>) -> Decoded<Vec<String>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Mapping(_) => {
            let mut labels = Vec::new();
            let group = shape::scalar("runs-on.group", node.get("group"))?;
            if !group.is_empty() {
                labels.push(format!("group:{}", group));
            }
            labels.extend(shape::string_list("runs-on.labels", node.get("labels"))?);
            Ok(labels)
        }
        _ => shape::string_list("runs-on", Some(node)),
    }
}

/// `secrets:` as `inherit` or a name/value mapping.
fn decode_secrets(node: Option<&Node>) -> Decoded<Vec<EnvVar>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Str(keyword) if keyword == "inherit" => Ok(vec![EnvVar {
            name: INHERIT_ALL_SECRETS.to_string(),
            value: INHERIT_ALL_SECRETS.to_string(),
            lines: Lines::new(node.line),
        }]),
        NodeKind::Str(keyword) => Err(DecodeError::Value {
            field: "secrets".to_string(),
            value: keyword.clone(),
            line: node.line,
        }),
        _ => shape::env_vars("secrets", Some(node)),
    }
}

fn decode_environment(node: Option<&Node>) -> Decoded<Vec<GithubActionsEnvironment>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Null => Ok(Vec::new()),
        NodeKind::Str(_) | NodeKind::Number(_) => Ok(vec![GithubActionsEnvironment {
            name: node.as_scalar_string().unwrap_or_default(),
            url: String::new(),
        }]),
        NodeKind::Mapping(_) => Ok(vec![GithubActionsEnvironment {
            name: shape::scalar("environment.name", node.get("name"))?,
            url: shape::scalar("environment.url", node.get("url"))?,
        }]),
        _ => Err(DecodeError::shape("environment", "a name or a mapping", node)),
    }
}

fn decode_container(id: &str, node: &Node) -> Decoded<Option<GithubActionsContainer>> {
    let image = match &node.kind {
        NodeKind::Null => return Ok(None),
        NodeKind::Str(image) => image.clone(),
        NodeKind::Mapping(_) => shape::scalar("container.image", node.get("image"))?,
        _ => return Err(DecodeError::shape("container", "an image or a mapping", node)),
    };
    Ok(Some(GithubActionsContainer {
        id: id.to_string(),
        image,
        lines: Lines::new(node.line),
    }))
}

fn decode_job(id: &str, line: usize, job: &Node) -> Decoded<GithubActionsJob> {
    if job.as_mapping().is_none() {
        return Err(DecodeError::shape(id, "a job mapping", job));
    }

    let container = match job.get("container") {
        Some(container) => decode_container("", container)?,
        None => None,
    };
    let services = match shape::mapping("services", job.get("services"))? {
        Some(services) => services
            .entries()
            .filter_map(|(sid, _, service)| decode_container(&sid, service).transpose())
            .collect::<Decoded<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(GithubActionsJob {
        id: id.to_string(),
        name: shape::scalar("name", job.get("name"))?,
        uses: shape::scalar("uses", job.get("uses"))?,
        with: shape::env_vars("with", job.get("with"))?,
        secrets: decode_secrets(job.get("secrets"))?,
        runs_on: decode_runs_on(job.get("runs-on"))?,
        permissions: decode_permissions(job.get("permissions"))?,
        needs: shape::string_list("needs", job.get("needs"))?,
        condition: shape::condition("if", job.get("if"))?,
        environment: decode_environment(job.get("environment"))?,
        container,
        services,
        outputs: shape::env_vars("outputs", job.get("outputs"))?,
        env: shape::env_vars("env", job.get("env"))?,
        steps: shape::sequence("steps", job.get("steps"))?
            .iter()
            .map(decode_step)
            .collect::<Decoded<Vec<_>>>()?,
        lines: Lines::new(line)
            .with("runs_on", job.key_line("runs-on"))
            .with("if", job.key_line("if"))
            .with("uses", job.key_line("uses"))
            .with("permissions", job.key_line("permissions"))
            .with("container", job.key_line("container"))
            .with("secrets", job.key_line("secrets")),
    })
}

pub(crate) fn decode_step(step: &Node) -> Decoded<GithubActionsStep> {
    if step.as_mapping().is_none() {
        return Err(DecodeError::shape("steps", "a step mapping", step));
    }

    let uses = shape::scalar("uses", step.get("uses"))?;
    let action = if uses.is_empty() {
        String::new()
    } else {
        Purl::from_github_action(&uses)
            .map(|purl| purl.to_string())
            .unwrap_or_default()
    };

    Ok(GithubActionsStep {
        id: shape::scalar("id", step.get("id"))?,
        name: shape::scalar("name", step.get("name"))?,
        condition: shape::condition("if", step.get("if"))?,
        env: shape::env_vars("env", step.get("env"))?,
        uses,
        action,
        with: shape::env_vars("with", step.get("with"))?,
        run: shape::scalar("run", step.get("run"))?,
        shell: shape::scalar("shell", step.get("shell"))?,
        working_directory: shape::scalar("working-directory", step.get("working-directory"))?,
        lines: Lines::new(step.line)
            .with("uses", step.key_line("uses"))
            .with("run", step.key_line("run"))
            .with("if", step.key_line("if"))
            .with("with", step.key_line("with"))
            .with("env", step.key_line("env")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_workflow() {
        let yaml = "name: T\non: [push]\njobs:\n  test:\n    runs-on: ubuntu-latest\n    steps:\n    - uses: actions/checkout@v4";
        let wf = GitHubActionsParser::decode(yaml, ".github/workflows/t.yml").unwrap();
        assert!(wf.is_valid());
        assert_eq!(wf.name, "T");
        assert_eq!(wf.jobs.len(), 1);
        assert_eq!(wf.jobs[0].id, "test");
        assert_eq!(wf.events.len(), 1);
        assert_eq!(wf.events[0].name, "push");

        let step = &wf.jobs[0].steps[0];
        assert_eq!(step.uses, "actions/checkout@v4");
        let purl: Purl = step.action.parse().unwrap();
        assert_eq!(purl.full_name(), "actions/checkout");
        assert_eq!(purl.version, "v4");
        assert_eq!(step.lines.start(), 7);
        assert_eq!(step.lines.get("uses"), Some(7));
        assert_eq!(wf.jobs[0].lines.start(), 4);
        assert_eq!(wf.jobs[0].lines.get("runs_on"), Some(5));
    }

    #[test]
    fn test_event_shapes() {
        let yaml = r#"
on:
  push:
    branches: [main]
    paths-ignore: docs/**
  pull_request_target:
    types: [opened, synchronize]
  schedule:
    - cron: "0 0 * * *"
  workflow_dispatch:
    inputs:
      target:
        description: Where to deploy
        required: true
        default: staging
jobs:
  noop:
    runs-on: ubuntu-latest
    steps: [{run: "true"}]
"#;
        let wf = GitHubActionsParser::decode(yaml, "w.yml").unwrap();
        assert_eq!(wf.events.len(), 4);
        assert_eq!(wf.events[0].branches, vec!["main"]);
        assert_eq!(wf.events[0].paths_ignore, vec!["docs/**"]);
        assert_eq!(wf.events[0].lines.start(), 3);
        assert_eq!(wf.events[1].types, vec!["opened", "synchronize"]);
        assert_eq!(wf.events[2].cron, vec!["0 0 * * *"]);
        let input = &wf.events[3].inputs[0];
        assert_eq!(input.name, "target");
        assert!(input.required);
        assert_eq!(input.default, "staging");
    }

    #[test]
    fn test_write_all_expands_to_every_scope() {
        let yaml = "on: push\npermissions: write-all\njobs:\n  a:\n    runs-on: x\n";
        let wf = GitHubActionsParser::decode(yaml, "w.yml").unwrap();
        assert_eq!(wf.permissions.len(), GITHUB_PERMISSION_SCOPES.len());
        assert!(wf.permissions.iter().all(|p| p.permission == "write"));
        for scope in GITHUB_PERMISSION_SCOPES {
            assert_eq!(wf.permissions.iter().filter(|p| p.scope == *scope).count(), 1);
        }

        let yaml = "on: push\njobs:\n  a:\n    runs-on: x\n    permissions: read-all\n";
        let wf = GitHubActionsParser::decode(yaml, "w.yml").unwrap();
        assert!(wf.jobs[0].permissions.iter().all(|p| p.permission == "read"));
    }

    #[test]
    fn test_permission_mapping_and_unknown_keyword() {
        let yaml = "on: push\npermissions:\n  contents: read\n  id-token: write\njobs:\n  a:\n    runs-on: x\n";
        let wf = GitHubActionsParser::decode(yaml, "w.yml").unwrap();
        assert_eq!(
            wf.permissions,
            vec![
                GithubActionsPermission { scope: "contents".into(), permission: "read".into() },
                GithubActionsPermission { scope: "id-token".into(), permission: "write".into() },
            ]
        );

        let yaml = "on: push\npermissions: everything\njobs:\n  a:\n    runs-on: x\n";
        assert!(GitHubActionsParser::decode(yaml, "w.yml").is_err());
    }

    #[test]
    fn test_runs_on_shapes_are_equivalent() {
        let scalar = node::load("runs-on: ubuntu-latest").unwrap();
        let list = node::load("runs-on: [ubuntu-latest]").unwrap();
        let object = node::load("runs-on:\n  labels: ubuntu-latest").unwrap();
        let a = decode_runs_on(scalar.get("runs-on")).unwrap();
        let b = decode_runs_on(list.get("runs-on")).unwrap();
        let c = decode_runs_on(object.get("runs-on")).unwrap();
        assert_eq!(a, vec!["ubuntu-latest"]);
        assert_eq!(a, b);
        assert_eq!(b, c);

        let grouped = node::load("runs-on:\n  group: large\n  labels: [linux, x64]").unwrap();
        assert_eq!(
            decode_runs_on(grouped.get("runs-on")).unwrap(),
            vec!["group:large", "linux", "x64"]
        );
        let bad = node::load("runs-on: !custom x").unwrap();
        assert!(decode_runs_on(bad.get("runs-on")).is_err());
    }

    #[test]
    fn test_secrets_inherit_and_reusable_workflow() {
        let yaml = r#"
on: workflow_call
jobs:
  call:
    uses: octo-org/shared/.github/workflows/build.yml@main
    with:
      target: prod
    secrets: inherit
"#;
        let wf = GitHubActionsParser::decode(yaml, "w.yml").unwrap();
        let job = &wf.jobs[0];
        assert_eq!(job.uses, "octo-org/shared/.github/workflows/build.yml@main");
        assert_eq!(job.secrets.len(), 1);
        assert_eq!(job.secrets[0].name, INHERIT_ALL_SECRETS);
        assert_eq!(job.with[0].value, "prod");
        assert_eq!(job.lines.get("uses"), Some(5));
    }

    #[test]
    fn test_workflow_without_jobs_or_events_is_invalid() {
        let no_jobs = GitHubActionsParser::decode("name: x\non: push\n", "w.yml").unwrap();
        assert!(!no_jobs.is_valid());
        let no_events =
            GitHubActionsParser::decode("jobs:\n  a:\n    runs-on: x\n", "w.yml").unwrap();
        assert!(!no_events.is_valid());
    }

    #[test]
    fn test_job_details() {
        let yaml = r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    needs: lint
    if: ${{ github.ref == 'refs/heads/main' }}
    environment:
      name: production
      url: https://example.com
    container: node:20
    services:
      redis:
        image: redis:7
    steps:
      - name: Build
        if: success()
        run: |
          npm ci
          npm run build
        env:
          CI: true
      - uses: ./.github/actions/local
"#;
        let wf = GitHubActionsParser::decode(yaml, "w.yml").unwrap();
        let job = &wf.jobs[0];
        assert_eq!(job.needs, vec!["lint"]);
        assert_eq!(job.condition, "${{ github.ref == 'refs/heads/main' }}");
        assert_eq!(job.environment[0].name, "production");
        assert_eq!(job.container.as_ref().unwrap().image, "node:20");
        assert_eq!(job.services[0].id, "redis");
        assert_eq!(job.services[0].image, "redis:7");

        let build = &job.steps[0];
        assert_eq!(build.run, "npm ci\nnpm run build\n");
        assert_eq!(build.lines.start(), 16);
        assert_eq!(build.lines.get("if"), Some(17));
        assert_eq!(build.lines.get("run"), Some(18));
        assert_eq!(build.env[0].value, "true");
        assert_eq!(job.steps[1].action, "");
    }

    #[test]
    fn test_action_metadata() {
        let yaml = r#"
name: Setup tool
author: acme
inputs:
  version:
    description: Tool version
    required: false
    default: "1.2"
outputs:
  path:
    description: Install path
    value: ${{ steps.install.outputs.path }}
runs:
  using: composite
  steps:
    - uses: actions/cache@v4
    - run: ./install.sh
      shell: bash
"#;
        let action = GitHubActionMetadataParser::decode(yaml, "action.yml").unwrap();
        assert!(action.is_valid());
        assert!(action.is_composite());
        assert_eq!(action.inputs[0].default, "1.2");
        assert_eq!(action.outputs[0].value, "${{ steps.install.outputs.path }}");
        assert_eq!(action.runs.steps.len(), 2);
        assert_eq!(action.runs.steps[0].action, "pkg:githubactions/actions/cache@v4");

        let docker = GitHubActionMetadataParser::decode(
            "runs:\n  using: docker\n  image: docker://alpine:3\n  args: [a, b]\n",
            "sub/action.yaml",
        )
        .unwrap();
        assert!(docker.is_docker());
        assert_eq!(docker.runs.args, vec!["a", "b"]);

        let empty = GitHubActionMetadataParser::decode("name: nothing\n", "action.yml").unwrap();
        assert!(!empty.is_valid());
    }

    #[test]
    fn test_path_patterns() {
        let wf = GitHubActionsParser;
        assert!(wf.matches(".github/workflows/ci.yml"));
        assert!(wf.matches(".github/workflows/ci.yaml"));
        assert!(!wf.matches(".github/workflows/nested/ci.yml"));
        assert!(!wf.matches("sub/.github/workflows/ci.yml"));

        let meta = GitHubActionMetadataParser;
        assert!(meta.matches("action.yml"));
        assert!(meta.matches(".github/actions/setup/action.yaml"));
        assert!(!meta.matches("my-action.yml"));
    }
}
