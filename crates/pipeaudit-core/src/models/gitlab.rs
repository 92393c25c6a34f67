use super::{EnvVar, Lines};
use serde::{Deserialize, Serialize};

/// One GitLab CI config file: the root `.gitlab-ci.yml` or a local include.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabciConfig {
    pub path: String,
    pub default: Option<GitlabciJob>,
    pub variables: Vec<EnvVar>,
    pub inputs: Vec<GitlabciInput>,
    pub stages: Vec<String>,
    pub include: Vec<GitlabciInclude>,
    pub workflow_rules: Vec<GitlabciRule>,
    pub jobs: Vec<GitlabciJob>,
    pub lines: Lines,
}

impl GitlabciConfig {
    pub fn is_valid(&self) -> bool {
        !self.jobs.is_empty() || !self.include.is_empty()
    }

    /// Repository-relative paths of `local` includes.
    pub fn local_includes(&self) -> impl Iterator<Item = &str> {
        self.include
            .iter()
            .filter(|i| i.kind == GitlabciIncludeKind::Local)
            .map(|i| i.local.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitlabciInput {
    pub name: String,
    pub default: String,
    pub description: String,
    pub input_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitlabciIncludeKind {
    Local,
    Remote,
    Template,
    Project,
    Component,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabciInclude {
    pub kind: GitlabciIncludeKind,
    pub local: String,
    pub remote: String,
    pub template: String,
    pub project: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub file: Vec<String>,
    pub component: String,
    pub lines: Lines,
}

impl GitlabciInclude {
    pub fn new(kind: GitlabciIncludeKind, lines: Lines) -> Self {
        Self {
            kind,
            local: String::new(),
            remote: String::new(),
            template: String::new(),
            project: String::new(),
            git_ref: String::new(),
            file: Vec::new(),
            component: String::new(),
            lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabciJob {
    pub name: String,
    /// Hidden jobs (`.name`) are templates for `extends`.
    pub hidden: bool,
    pub stage: String,
    pub image: Option<GitlabciImage>,
    pub services: Vec<GitlabciImage>,
    pub variables: Vec<EnvVar>,
    pub before_script: Vec<GitlabciScript>,
    pub script: Vec<GitlabciScript>,
    pub after_script: Vec<GitlabciScript>,
    pub rules: Vec<GitlabciRule>,
    pub extends: Vec<String>,
    pub needs: Vec<String>,
    /// Downstream pipeline trigger (`trigger: project` or `trigger: include`).
    pub trigger: String,
    pub lines: Lines,
}

impl GitlabciJob {
    pub fn new(name: &str, lines: Lines) -> Self {
        Self {
            name: name.to_string(),
            hidden: name.starts_with('.'),
            stage: String::new(),
            image: None,
            services: Vec::new(),
            variables: Vec::new(),
            before_script: Vec::new(),
            script: Vec::new(),
            after_script: Vec::new(),
            rules: Vec::new(),
            extends: Vec::new(),
            needs: Vec::new(),
            trigger: String::new(),
            lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabciImage {
    pub name: String,
    pub entrypoint: Vec<String>,
    pub lines: Lines,
}

/// One script line. `!reference` entries are kept verbatim, never resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabciScript {
    pub run: String,
    pub reference: bool,
    pub lines: Lines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabciRule {
    pub condition: String,
    pub when: String,
    pub lines: Lines,
}
