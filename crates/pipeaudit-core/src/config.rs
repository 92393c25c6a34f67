use crate::engine::Severity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file looked up in the scanned directory.
pub const CONFIG_FILE: &str = ".pipeaudit.toml";

pub const DEFAULT_MAX_CONCURRENCY: usize = 2;

/// Configuration loaded from `.pipeaudit.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repositories analyzed at the same time in organization mode.
    pub max_concurrency: usize,

    /// Skip forked and archived repositories when listing an organization.
    pub ignore_forks: bool,

    pub scm: ScmKind,

    /// API base URL for self-hosted GitHub Enterprise or GitLab instances.
    pub scm_base_url: Option<String>,

    /// Reputation service endpoint. No lookup is made when unset.
    pub reputation_url: Option<String>,

    /// Findings to suppress.
    pub skip: Vec<SkipRule>,

    /// When non-empty, only these rule ids are reported.
    pub allowed_rules: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            ignore_forks: false,
            scm: ScmKind::GitHub,
            scm_base_url: None,
            reputation_url: None,
            skip: Vec::new(),
            allowed_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmKind {
    GitHub,
    GitLab,
}

/// Suppression entry. Every field that is set must match the finding.
///
/// `path` accepts `*` wildcards; `level` suppresses findings at or below it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipRule {
    pub rule: Option<String>,
    pub path: Option<String>,
    pub job: Option<String>,
    pub purl: Option<String>,
    pub level: Option<Severity>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.pipeaudit.toml` from `dir` if present, defaults otherwise.
    pub fn discover(dir: &Path) -> anyhow::Result<Config> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Config::default())
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be at least 1");
        }
        Ok(())
    }
}
