//! Dependency inference: every external artifact a package's pipelines pull in,
//! with the place it is referenced from.

use super::DependencyReport;
use crate::models::*;
use crate::purl::{self, Purl};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Action,
    ReusableWorkflow,
    Image,
    Include,
    Component,
    Task,
    Pipeline,
}

/// One reference to a dependency from a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyUse {
    pub purl: Purl,
    /// The reference as written in the manifest.
    pub reference: String,
    pub kind: UseKind,
    pub path: String,
    pub line: usize,
    pub job: String,
    pub step: String,
    /// Pulled in by consumers of the package rather than by its own builds.
    pub package_dependency: bool,
}

impl DependencyUse {
    fn new(purl: Purl, reference: &str, kind: UseKind, path: &str, line: usize) -> Self {
        Self {
            purl,
            reference: reference.to_string(),
            kind,
            path: path.to_string(),
            line,
            job: String::new(),
            step: String::new(),
            package_dependency: false,
        }
    }

    fn in_job(mut self, job: &str) -> Self {
        self.job = job.to_string();
        self
    }

    fn in_step(mut self, step: &str) -> Self {
        self.step = step.to_string();
        self
    }
}

/// Split dependency uses into the sorted, deduplicated build and package sets.
pub fn infer(packages: &[PackageInsights]) -> DependencyReport {
    let mut build = BTreeSet::new();
    let mut package = BTreeSet::new();
    for pkg in packages {
        for dep in collect(pkg) {
            if dep.package_dependency {
                package.insert(dep.purl.to_string());
            } else {
                build.insert(dep.purl.to_string());
            }
        }
    }
    DependencyReport {
        build_dependencies: build.into_iter().collect(),
        package_dependencies: package.into_iter().collect(),
    }
}

/// Every dependency reference in `package`, in manifest order.
pub fn collect(package: &PackageInsights) -> Vec<DependencyUse> {
    let mut uses = Vec::new();
    for workflow in &package.github_actions_workflows {
        collect_workflow(workflow, &mut uses);
    }
    for action in &package.github_actions_metadata {
        collect_action(action, &mut uses);
    }
    for config in &package.gitlabci_configs {
        collect_gitlab(config, &mut uses);
    }
    for pipeline in &package.azure_pipelines {
        collect_azure(pipeline, &mut uses);
    }
    for run in &package.pipeline_as_code_tekton {
        collect_tekton(run, &mut uses);
    }
    uses
}

fn step_label(id: &str, name: &str, index: usize) -> String {
    if !id.is_empty() {
        id.to_string()
    } else if !name.is_empty() {
        name.to_string()
    } else {
        index.to_string()
    }
}

fn action_use(uses: &str, path: &str, line: usize) -> Option<DependencyUse> {
    let purl = Purl::from_github_action(uses).ok()?;
    let kind = if purl.purl_type == purl::TYPE_DOCKER {
        UseKind::Image
    } else {
        UseKind::Action
    };
    Some(DependencyUse::new(purl, uses, kind, path, line))
}

fn image_use(image: &str, path: &str, line: usize) -> Option<DependencyUse> {
    let purl = Purl::from_docker_image(image).ok()?;
    Some(DependencyUse::new(purl, image, UseKind::Image, path, line))
}

fn collect_workflow(workflow: &GithubActionsWorkflow, out: &mut Vec<DependencyUse>) {
    let path = &workflow.path;
    for job in &workflow.jobs {
        if !job.uses.is_empty() {
            if let Some(dep) = action_use(&job.uses, path, job.lines.line_of("uses")) {
                let dep = DependencyUse {
                    kind: UseKind::ReusableWorkflow,
                    ..dep
                };
                out.push(dep.in_job(&job.id));
            }
        }
        for container in job.container.iter().chain(&job.services) {
            if let Some(dep) = image_use(&container.image, path, container.lines.start()) {
                out.push(dep.in_job(&job.id));
            }
        }
        for (i, step) in job.steps.iter().enumerate() {
            if step.uses.is_empty() {
                continue;
            }
            if let Some(dep) = action_use(&step.uses, path, step.lines.line_of("uses")) {
                out.push(dep.in_job(&job.id).in_step(&step_label(&step.id, &step.name, i)));
            }
        }
    }
}

fn collect_action(action: &GithubActionsMetadata, out: &mut Vec<DependencyUse>) {
    let path = &action.path;
    let runs_line = action.lines.line_of("runs");
    let mut deps = Vec::new();
    if let Some(image) = action.runs.image.strip_prefix("docker://") {
        deps.extend(image_use(image, path, runs_line));
    }
    for (i, step) in action.runs.steps.iter().enumerate() {
        if step.uses.is_empty() {
            continue;
        }
        if let Some(dep) = action_use(&step.uses, path, step.lines.line_of("uses")) {
            deps.push(dep.in_step(&step_label(&step.id, &step.name, i)));
        }
    }
    out.extend(deps.into_iter().map(|dep| DependencyUse {
        package_dependency: true,
        ..dep
    }));
}

fn collect_gitlab(config: &GitlabciConfig, out: &mut Vec<DependencyUse>) {
    let path = &config.path;
    for include in &config.include {
        out.extend(include_uses(include, path));
    }
    for job in config.default.iter().chain(&config.jobs) {
        for image in job.image.iter().chain(&job.services) {
            if let Some(dep) = image_use(&image.name, path, image.lines.start()) {
                out.push(dep.in_job(&job.name));
            }
        }
    }
}

fn include_uses(include: &GitlabciInclude, path: &str) -> Vec<DependencyUse> {
    let line = include.lines.start();
    let templated = |s: &str| s.contains('$');
    match include.kind {
        GitlabciIncludeKind::Local => Vec::new(),
        GitlabciIncludeKind::Remote if templated(&include.remote) => Vec::new(),
        GitlabciIncludeKind::Remote => {
            let without_query = include.remote.split(['?', '#']).next().unwrap_or_default();
            let name = without_query.rsplit('/').next().unwrap_or_default();
            if name.is_empty() {
                return Vec::new();
            }
            let purl = Purl::new(purl::TYPE_GITLAB_CI, "remote", name, "")
                .with_qualifier("download_url", &include.remote);
            vec![DependencyUse::new(purl, &include.remote, UseKind::Include, path, line)]
        }
        GitlabciIncludeKind::Template => {
            let purl = Purl::new(purl::TYPE_GITLAB_CI, "template", &include.template, "");
            vec![DependencyUse::new(purl, &include.template, UseKind::Include, path, line)]
        }
        GitlabciIncludeKind::Project => {
            let project = include.project.trim_matches('/');
            if templated(project) || templated(&include.git_ref) {
                return Vec::new();
            }
            let Some((namespace, name)) = project.rsplit_once('/') else {
                return Vec::new();
            };
            let base = Purl::new(purl::TYPE_GITLAB_CI, namespace, name, &include.git_ref);
            let files: Vec<&str> = if include.file.is_empty() {
                vec![""]
            } else {
                include.file.iter().map(String::as_str).collect()
            };
            files
                .into_iter()
                .map(|file| {
                    let purl = base.clone().with_subpath(file).normalized();
                    DependencyUse::new(purl, project, UseKind::Include, path, line)
                })
                .collect()
        }
        GitlabciIncludeKind::Component => component_purl(&include.component)
            .map(|purl| DependencyUse::new(purl, &include.component, UseKind::Component, path, line))
            .into_iter()
            .collect(),
    }
}

/// `host/group/project/component@version`.
fn component_purl(component: &str) -> Option<Purl> {
    if component.contains('$') {
        return None;
    }
    let (location, version) = component.split_once('@').unwrap_or((component, ""));
    let mut segments: Vec<&str> = location.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return None;
    }
    let host = segments.remove(0);
    let name = segments.pop()?;
    Some(
        Purl::new(purl::TYPE_GITLAB_CI, &segments.join("/"), name, version)
            .with_qualifier("repository_url", host)
            .normalized(),
    )
}

fn collect_azure(pipeline: &AzurePipelinesPipeline, out: &mut Vec<DependencyUse>) {
    let path = &pipeline.path;
    for stage in &pipeline.stages {
        for job in &stage.jobs {
            let job_name = if job.deployment.is_empty() { &job.job } else { &job.deployment };
            for (i, step) in job.steps.iter().enumerate() {
                let AzureStepKind::Task(task) = &step.kind else {
                    continue;
                };
                if let Ok(purl) = Purl::from_azure_task(task) {
                    let line = step.lines.line_of("task");
                    let label = step_label("", &step.display_name, i);
                    out.push(
                        DependencyUse::new(purl, task, UseKind::Task, path, line)
                            .in_job(job_name)
                            .in_step(&label),
                    );
                }
            }
        }
    }
}

const TEKTON_TASK_ANNOTATION: &str = "pipelinesascode.tekton.dev/task";
const TEKTON_PIPELINE_ANNOTATION: &str = "pipelinesascode.tekton.dev/pipeline";

fn collect_tekton(run: &TektonPipelineRun, out: &mut Vec<DependencyUse>) {
    let path = &run.path;
    for annotation in &run.metadata.annotations {
        let kind = if annotation.name.starts_with(TEKTON_TASK_ANNOTATION) {
            "task"
        } else if annotation.name == TEKTON_PIPELINE_ANNOTATION {
            "pipeline"
        } else {
            continue;
        };
        for entry in annotation_list(&annotation.value) {
            // Remote URLs and repository-relative files are fetched as-is, not from the hub.
            if entry.contains("://") || entry.contains('/') {
                continue;
            }
            let (name, version) = entry.split_once(':').unwrap_or((entry, ""));
            if let Ok(purl) = Purl::from_tekton(kind, name, version) {
                let use_kind = if kind == "task" { UseKind::Task } else { UseKind::Pipeline };
                out.push(DependencyUse::new(purl, entry, use_kind, path, annotation.lines.start()));
            }
        }
    }

    for task in &run.tasks {
        if let Some(task_ref) = &task.task_ref {
            if let Some(dep) = task_ref_use(task_ref, path, task.lines.line_of("taskRef")) {
                out.push(dep.in_job(&task.name));
            }
        }
        for step in &task.steps {
            if let Some(dep) = image_use(&step.image, path, step.lines.line_of("image")) {
                out.push(dep.in_job(&task.name).in_step(&step.name));
            }
        }
    }
}

/// `[a, b]` or `a, b` annotation values.
fn annotation_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|s| !s.is_empty())
}

fn task_ref_use(task_ref: &TektonTaskRef, path: &str, line: usize) -> Option<DependencyUse> {
    let param = |name: &str| {
        task_ref
            .params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
            .unwrap_or_default()
    };
    match task_ref.resolver.as_str() {
        "bundles" => image_use(param("bundle"), path, line).map(|dep| DependencyUse {
            kind: UseKind::Task,
            ..dep
        }),
        "hub" => {
            let kind = if param("kind").is_empty() { "task" } else { param("kind") };
            let purl = Purl::from_tekton(kind, param("name"), param("version")).ok()?;
            Some(DependencyUse::new(purl, param("name"), UseKind::Task, path, line))
        }
        "git" => {
            let url = param("url");
            let repo = url
                .strip_prefix("https://github.com/")?
                .trim_end_matches('/')
                .trim_end_matches(".git");
            let purl = Purl::from_github_repo(repo, param("revision"))
                .ok()?
                .join_subpath(param("pathInRepo"));
            Some(DependencyUse::new(purl, url, UseKind::Task, path, line))
        }
        _ => None,
    }
}
