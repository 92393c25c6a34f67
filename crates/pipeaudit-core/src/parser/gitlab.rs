use super::node::{self, Node, NodeKind};
use super::shape::{self, Decoded};
use super::{read_source, RootParser};
use crate::error::{DecodeError, ScanError};
use crate::models::*;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use tracing::{debug, warn};

/// Parser for GitLab CI: `.gitlab-ci.yml` plus every local include reachable from it.
pub struct GitLabCIParser;

pub const ROOT_CONFIG: &str = ".gitlab-ci.yml";

/// Upper bound on fragments processed per repository, cycles included.
pub const MAX_INCLUDE_FRAGMENTS: usize = 150;

/// Reserved top-level keywords in GitLab CI that are NOT job definitions.
const RESERVED_KEYWORDS: &[&str] = &[
    "image", "services", "stages", "types", "before_script", "after_script",
    "variables", "cache", "default", "include", "workflow", "spec",
];

impl GitLabCIParser {
    /// Decode one GitLab CI file. A leading `spec:` header document supplies inputs.
    pub fn decode(content: &str, path: &str) -> Decoded<GitlabciConfig> {
        let mut docs = node::load_all(content)?;
        let header = if docs.len() > 1 && docs[0].get("spec").is_some() {
            Some(docs.remove(0))
        } else {
            None
        };
        let doc = docs.into_iter().next().unwrap_or_else(|| Node::null(1));

        let inputs = match header.as_ref().or(Some(&doc)).and_then(|h| h.get("spec")) {
            Some(spec) => match shape::mapping("spec", Some(spec))? {
                Some(spec) => decode_inputs(spec.get("inputs"))?,
                None => Vec::new(),
            },
            None => Vec::new(),
        };

        if doc.is_null() {
            return Ok(GitlabciConfig {
                path: path.to_string(),
                default: None,
                variables: Vec::new(),
                inputs,
                stages: Vec::new(),
                include: Vec::new(),
                workflow_rules: Vec::new(),
                jobs: Vec::new(),
                lines: Lines::new(doc.line),
            });
        }
        if doc.as_mapping().is_none() {
            return Err(DecodeError::shape("config", "a mapping", &doc));
        }

        let default = match doc.entry("default") {
            Some((key, default)) => match shape::mapping("default", Some(default))? {
                Some(default) => Some(decode_job("default", key.line, default)?),
                None => None,
            },
            None => legacy_default(&doc)?,
        };

        let workflow_rules = match shape::mapping("workflow", doc.get("workflow"))? {
            Some(workflow) => decode_rules(workflow.get("rules"))?,
            None => Vec::new(),
        };

        let mut jobs = Vec::new();
        for (name, key, job) in doc.entries() {
            if RESERVED_KEYWORDS.contains(&name.as_str()) {
                continue;
            }
            // Hidden keys also hold plain anchors such as script lists.
            if job.as_mapping().is_none() {
                debug!(path, job = %name, "skipping non-mapping top-level key");
                continue;
            }
            jobs.push(decode_job(&name, key.line, job)?);
        }

        Ok(GitlabciConfig {
            path: path.to_string(),
            default,
            variables: decode_variables(doc.get("variables"))?,
            inputs,
            stages: shape::string_list("stages", doc.get("stages"))?,
            include: decode_includes(doc.get("include"))?,
            workflow_rules,
            jobs,
            lines: Lines::new(doc.line)
                .with("include", doc.key_line("include"))
                .with("workflow", doc.key_line("workflow")),
        })
    }

    /// Decode the root config and follow local includes breadth-first.
    ///
    /// Every fragment is returned as its own config, root first. Paths are
    /// identified by their normalized form so each file is decoded at most once.
    pub fn resolve(root: &Path) -> Result<Vec<GitlabciConfig>, ScanError> {
        let mut configs = Vec::new();
        let mut queue = VecDeque::from([ROOT_CONFIG.to_string()]);
        let mut visited = HashSet::new();
        let mut processed = 0;

        while let Some(include) = queue.pop_front() {
            if processed >= MAX_INCLUDE_FRAGMENTS {
                warn!(
                    root = %root.display(),
                    limit = MAX_INCLUDE_FRAGMENTS,
                    "include fragment limit reached, remaining includes ignored"
                );
                break;
            }

            let rel = normalize_include_path(&include);
            if !visited.insert(rel.clone()) {
                continue;
            }
            if rel.contains('*') || rel.contains('$') {
                debug!(include = %include, "skipping templated include path");
                continue;
            }
            let file = root.join(&rel);
            if !file.is_file() {
                debug!(include = %rel, "skipping missing include");
                continue;
            }

            processed += 1;
            let Some(content) = read_source(&file)? else {
                continue;
            };
            match Self::decode(&content, &rel) {
                Ok(config) => {
                    queue.extend(config.local_includes().map(str::to_string));
                    if config.is_valid() {
                        configs.push(config);
                    } else {
                        debug!(path = %rel, "skipping GitLab CI fragment without jobs or includes");
                    }
                }
                Err(e) => warn!(path = %rel, error = %e, "failed to decode GitLab CI config"),
            }
        }
        Ok(configs)
    }
}

impl RootParser for GitLabCIParser {
    fn name(&self) -> &'static str {
        "gitlab-ci"
    }

    fn parse_root(&self, root: &Path, package: &mut PackageInsights) -> Result<(), ScanError> {
        package.gitlabci_configs.extend(Self::resolve(root)?);
        Ok(())
    }
}

/// Strip the leading `/` and collapse `.` and `..` segments.
pub fn normalize_include_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.trim().split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Pre-`default:` global keywords, folded into a default job when present.
fn legacy_default(doc: &Node) -> Decoded<Option<GitlabciJob>> {
    let keys = ["image", "services", "before_script", "after_script"];
    let Some(line) = keys.iter().find_map(|k| doc.key_line(k)) else {
        return Ok(None);
    };
    let mut job = GitlabciJob::new("default", Lines::new(line));
    job.image = decode_image("image", doc.get("image"))?;
    job.services = decode_services(doc.get("services"))?;
    job.before_script = decode_script("before_script", doc.get("before_script"))?;
    job.after_script = decode_script("after_script", doc.get("after_script"))?;
    Ok(Some(job))
}

fn decode_inputs(node: Option<&Node>) -> Decoded<Vec<GitlabciInput>> {
    let Some(inputs) = shape::mapping("spec.inputs", node)? else {
        return Ok(Vec::new());
    };
    inputs
        .entries()
        .map(|(name, _, input)| {
            if input.is_null() {
                return Ok(GitlabciInput {
                    name,
                    ..Default::default()
                });
            }
            if input.as_mapping().is_none() {
                return Err(DecodeError::shape("spec.inputs", "a mapping", input));
            }
            Ok(GitlabciInput {
                name,
                default: input.get("default").map(Node::render).unwrap_or_default(),
                description: shape::scalar("description", input.get("description"))?,
                input_type: shape::scalar("type", input.get("type"))?,
            })
        })
        .collect()
}

/// `variables:` values are scalars or `{value, description, ...}`.
fn decode_variables(node: Option<&Node>) -> Decoded<Vec<EnvVar>> {
    let Some(vars) = shape::mapping("variables", node)? else {
        return Ok(Vec::new());
    };
    vars.entries()
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
        .collect()
}

/// `include:` as one path or URL, one mapping, or a list of either.
fn decode_includes(node: Option<&Node>) -> Decoded<Vec<GitlabciInclude>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Null => Ok(Vec::new()),
        NodeKind::Str(_) | NodeKind::Mapping(_) => Ok(vec![decode_include(node)?]),
        NodeKind::Sequence(items) => items.iter().map(decode_include).collect(),
        _ => Err(DecodeError::shape("include", "a path, a mapping or a list", node)),
    }
}

fn decode_include(node: &Node) -> Decoded<GitlabciInclude> {
    let lines = Lines::new(node.line);
    match &node.kind {
        NodeKind::Str(location) => {
            if location.starts_with("https://") || location.starts_with("http://") {
                let mut include = GitlabciInclude::new(GitlabciIncludeKind::Remote, lines);
                include.remote = location.clone();
                Ok(include)
            } else {
                let mut include = GitlabciInclude::new(GitlabciIncludeKind::Local, lines);
                include.local = location.clone();
                Ok(include)
            }
        }
        NodeKind::Mapping(_) => {
            let include = if let Some(local) = node.get("local") {
                let mut include = GitlabciInclude::new(GitlabciIncludeKind::Local, lines);
                include.local = shape::scalar("include.local", Some(local))?;
                include
            } else if let Some(remote) = node.get("remote") {
                let mut include = GitlabciInclude::new(GitlabciIncludeKind::Remote, lines);
                include.remote = shape::scalar("include.remote", Some(remote))?;
                include
            } else if let Some(template) = node.get("template") {
                let mut include = GitlabciInclude::new(GitlabciIncludeKind::Template, lines);
                include.template = shape::scalar("include.template", Some(template))?;
                include
            } else if let Some(project) = node.get("project") {
                let mut include = GitlabciInclude::new(GitlabciIncludeKind::Project, lines);
                include.project = shape::scalar("include.project", Some(project))?;
                include.git_ref = shape::scalar("include.ref", node.get("ref"))?;
                include.file = shape::string_list("include.file", node.get("file"))?;
                include
            } else if let Some(component) = node.get("component") {
                let mut include = GitlabciInclude::new(GitlabciIncludeKind::Component, lines);
                include.component = shape::scalar("include.component", Some(component))?;
                include
            } else {
                return Err(DecodeError::shape(
                    "include",
                    "a local, remote, template, project or component include",
                    node,
                ));
            };
            Ok(include)
        }
        _ => Err(DecodeError::shape("include", "a path or a mapping", node)),
    }
}

fn decode_job(name: &str, line: usize, job: &Node) -> Decoded<GitlabciJob> {
    let mut decoded = GitlabciJob::new(
        name,
        Lines::new(line)
            .with("script", job.key_line("script"))
            .with("image", job.key_line("image"))
            .with("rules", job.key_line("rules"))
            .with("trigger", job.key_line("trigger")),
    );
    decoded.stage = shape::scalar("stage", job.get("stage"))?;
    decoded.image = decode_image("image", job.get("image"))?;
    decoded.services = decode_services(job.get("services"))?;
    decoded.variables = decode_variables(job.get("variables"))?;
    decoded.before_script = decode_script("before_script", job.get("before_script"))?;
    decoded.script = decode_script("script", job.get("script"))?;
    decoded.after_script = decode_script("after_script", job.get("after_script"))?;
    decoded.rules = decode_rules(job.get("rules"))?;
    decoded.extends = shape::string_list("extends", job.get("extends"))?;
    decoded.needs = decode_needs(job.get("needs"))?;
    decoded.trigger = decode_trigger(job.get("trigger"))?;
    Ok(decoded)
}

/// `image:` as a name or `{name, entrypoint}`.
fn decode_image(field: &str, node: Option<&Node>) -> Decoded<Option<GitlabciImage>> {
    let Some(node) = node else {
        return Ok(None);
    };
    match &node.kind {
        NodeKind::Null => Ok(None),
        NodeKind::Str(name) => Ok(Some(GitlabciImage {
            name: name.clone(),
            entrypoint: Vec::new(),
            lines: Lines::new(node.line),
        })),
        NodeKind::Mapping(_) => Ok(Some(GitlabciImage {
            name: shape::scalar("image.name", node.get("name"))?,
            entrypoint: shape::string_list("image.entrypoint", node.get("entrypoint"))?,
            lines: Lines::new(node.line),
        })),
        _ => Err(DecodeError::shape(field, "an image name or a mapping", node)),
    }
}

fn decode_services(node: Option<&Node>) -> Decoded<Vec<GitlabciImage>> {
    shape::sequence("services", node)?
        .iter()
        .filter_map(|service| decode_image("services", Some(service)).transpose())
        .collect()
}

/// Script lines. Nested lists are flattened and `!reference` entries kept as written.
fn decode_script(field: &str, node: Option<&Node>) -> Decoded<Vec<GitlabciScript>> {
    let mut lines = Vec::new();
    if let Some(node) = node {
        collect_script(field, node, &mut lines)?;
    }
    Ok(lines)
}

fn collect_script(field: &str, node: &Node, out: &mut Vec<GitlabciScript>) -> Decoded<()> {
    match &node.kind {
        NodeKind::Null => {}
        NodeKind::Str(_) | NodeKind::Number(_) | NodeKind::Bool(_) => out.push(GitlabciScript {
            run: node.as_scalar_string().unwrap_or_default(),
            reference: false,
            lines: Lines::new(node.line),
        }),
        NodeKind::Tagged(tag, _) if tag == "reference" => out.push(GitlabciScript {
            run: node.render(),
            reference: true,
            lines: Lines::new(node.line),
        }),
        NodeKind::Sequence(items) => {
            for item in items {
                collect_script(field, item, out)?;
            }
        }
        _ => return Err(DecodeError::shape(field, "a line or a list of lines", node)),
    }
    Ok(())
}

fn decode_rules(node: Option<&Node>) -> Decoded<Vec<GitlabciRule>> {
    shape::sequence("rules", node)?
        .iter()
        .map(|rule| {
            if rule.as_mapping().is_none() {
                return Err(DecodeError::shape("rules", "a rule mapping", rule));
            }
            Ok(GitlabciRule {
                condition: shape::condition("rules.if", rule.get("if"))?,
                when: shape::scalar("rules.when", rule.get("when"))?,
                lines: Lines::new(rule.line).with("if", rule.key_line("if")),
            })
        })
        .collect()
}

/// `needs:` entries are job names or `{job: name, ...}`.
fn decode_needs(node: Option<&Node>) -> Decoded<Vec<String>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    match &node.kind {
        NodeKind::Sequence(items) => items
            .iter()
            .map(|item| match &item.kind {
                NodeKind::Mapping(_) => {
                    let job = shape::scalar("needs.job", item.get("job"))?;
                    if job.is_empty() {
                        shape::scalar("needs.pipeline", item.get("pipeline"))
                    } else {
                        Ok(job)
                    }
                }
                _ => shape::scalar("needs", Some(item)),
            })
            .collect(),
        _ => shape::string_list("needs", Some(node)),
    }
}

/// `trigger:` as a downstream project path or `{project | include, ...}`.
fn decode_trigger(node: Option<&Node>) -> Decoded<String> {
    let Some(node) = node else {
        return Ok(String::new());
    };
    match &node.kind {
        NodeKind::Null => Ok(String::new()),
        NodeKind::Str(project) => Ok(project.clone()),
        NodeKind::Mapping(_) => {
            let project = shape::scalar("trigger.project", node.get("project"))?;
            if !project.is_empty() {
                return Ok(project);
            }
            Ok(node.get("include").map(Node::render).unwrap_or_default())
        }
        _ => Err(DecodeError::shape("trigger", "a project or a mapping", node)),
    }
}
