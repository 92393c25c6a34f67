//! Source-control providers that list and describe repositories.

pub mod github;
pub mod gitlab;
pub mod local;

pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;
pub use local::LocalProvider;

use crate::config::{Config, ScmKind};
use crate::error::ScmError;
use crate::purl::{Purl, PurlError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Repositories requested per listing page.
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Owner, organization or group path.
    pub namespace: String,
    pub name: String,
    pub clone_url: String,
    pub html_url: String,
    pub default_branch: String,
    pub is_fork: bool,
    pub is_archived: bool,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryPage {
    pub repositories: Vec<Repository>,
    /// Page to request next, `None` on the last page.
    pub next_page: Option<u32>,
}

#[async_trait]
pub trait ScmProvider: Send + Sync {
    async fn list_repositories(&self, org: &str, page: u32) -> Result<RepositoryPage, ScmError>;

    async fn get_repository(&self, org: &str, name: &str) -> Result<Repository, ScmError>;

    fn clone_url(&self, repo: &Repository) -> String {
        repo.clone_url.clone()
    }

    fn token(&self) -> Option<&str>;

    fn provider_name(&self) -> &str;

    fn provider_version(&self) -> String;

    /// Purl type of the packages this provider hosts.
    fn scm_type(&self) -> &str;

    /// Package identity of `repo` at `version`.
    fn repository_purl(&self, repo: &Repository, version: &str) -> Result<Purl, PurlError>;
}

/// The closed set of providers, selected once from configuration.
pub enum ScmClient {
    GitHub(GitHubProvider),
    GitLab(GitLabProvider),
    Local(LocalProvider),
}

impl ScmClient {
    pub fn from_config(config: &Config, token: Option<String>) -> Result<Self, ScmError> {
        let base_url = config.scm_base_url.as_deref();
        Ok(match config.scm {
            ScmKind::GitHub => ScmClient::GitHub(GitHubProvider::new(token, base_url)?),
            ScmKind::GitLab => ScmClient::GitLab(GitLabProvider::new(token, base_url)?),
        })
    }

    fn inner(&self) -> &dyn ScmProvider {
        match self {
            ScmClient::GitHub(p) => p,
            ScmClient::GitLab(p) => p,
            ScmClient::Local(p) => p,
        }
    }
}

#[async_trait]
impl ScmProvider for ScmClient {
    async fn list_repositories(&self, org: &str, page: u32) -> Result<RepositoryPage, ScmError> {
        self.inner().list_repositories(org, page).await
    }

    async fn get_repository(&self, org: &str, name: &str) -> Result<Repository, ScmError> {
        self.inner().get_repository(org, name).await
    }

    fn clone_url(&self, repo: &Repository) -> String {
        self.inner().clone_url(repo)
    }

    fn token(&self) -> Option<&str> {
        self.inner().token()
    }

    fn provider_name(&self) -> &str {
        self.inner().provider_name()
    }

    fn provider_version(&self) -> String {
        self.inner().provider_version()
    }

    fn scm_type(&self) -> &str {
        self.inner().scm_type()
    }

    fn repository_purl(&self, repo: &Repository, version: &str) -> Result<Purl, PurlError> {
        self.inner().repository_purl(repo, version)
    }
}

/// Map a non-success response to an error, 404 becoming `NotFound(what)`.
pub(crate) fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response, ScmError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ScmError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        return Err(ScmError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_config() {
        let client = ScmClient::from_config(&Config::default(), None).unwrap();
        assert!(matches!(client, ScmClient::GitHub(_)));
        assert_eq!(client.provider_name(), "github");
        assert_eq!(client.scm_type(), "github");

        let config = Config {
            scm: ScmKind::GitLab,
            scm_base_url: Some("https://gitlab.example.com/api/v4".to_string()),
            ..Default::default()
        };
        let client = ScmClient::from_config(&config, Some("glpat-x".to_string())).unwrap();
        assert!(matches!(client, ScmClient::GitLab(_)));
        assert_eq!(client.token(), Some("glpat-x"));
        assert_eq!(client.scm_type(), "gitlab");
    }

    #[test]
    fn test_repository_purl_per_provider() {
        let repo = Repository {
            namespace: "Acme".to_string(),
            name: "App".to_string(),
            ..Default::default()
        };
        let github = ScmClient::from_config(&Config::default(), None).unwrap();
        assert_eq!(
            github.repository_purl(&repo, "main").unwrap().to_string(),
            "pkg:github/acme/app@main"
        );

        let config = Config {
            scm: ScmKind::GitLab,
            ..Default::default()
        };
        let gitlab = ScmClient::from_config(&config, None).unwrap();
        let repo = Repository {
            namespace: "group/sub".to_string(),
            ..repo
        };
        assert_eq!(
            gitlab.repository_purl(&repo, "").unwrap().to_string(),
            "pkg:gitlab/group/sub/app"
        );
    }
}
