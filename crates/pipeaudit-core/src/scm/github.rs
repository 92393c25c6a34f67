use super::{check_status, Repository, RepositoryPage, ScmProvider, PAGE_SIZE};
use crate::error::ScmError;
use crate::purl::{Purl, PurlError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const API_VERSION: &str = "2022-11-28";

/// GitHub REST API client for listing organization repositories
pub struct GitHubProvider {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

/// Repository from the GitHub API
#[derive(Debug, Deserialize)]
struct GitHubRepository {
    name: String,
    owner: GitHubOwner,
    clone_url: String,
    html_url: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubOwner {
    login: String,
}

impl From<GitHubRepository> for Repository {
    fn from(repo: GitHubRepository) -> Self {
        Repository {
            namespace: repo.owner.login,
            name: repo.name,
            clone_url: repo.clone_url,
            html_url: repo.html_url,
            default_branch: repo.default_branch.unwrap_or_default(),
            is_fork: repo.fork,
            is_archived: repo.archived,
        }
    }
}

impl GitHubProvider {
    /// Create a new GitHub API client
    pub fn new(token: Option<String>, base_url: Option<&str>) -> Result<Self, ScmError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("pipeaudit/", env!("CARGO_PKG_VERSION"))),
        );

        if let Some(ref t) = token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", t))
                    .map_err(|_| ScmError::Config("invalid GitHub token".to_string()))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token,
            base_url: base_url
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl ScmProvider for GitHubProvider {
    async fn list_repositories(&self, org: &str, page: u32) -> Result<RepositoryPage, ScmError> {
        let url = format!("{}/orgs/{}/repos", self.base_url, org);
        debug!(org, page, "listing GitHub repositories");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("type", "all".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await?;
        let repos: Vec<GitHubRepository> = check_status(response, org)?.json().await?;

        let full = repos.len() as u32 >= PAGE_SIZE;
        Ok(RepositoryPage {
            repositories: repos.into_iter().map(Repository::from).collect(),
            next_page: full.then_some(page + 1),
        })
    }

    async fn get_repository(&self, org: &str, name: &str) -> Result<Repository, ScmError> {
        let url = format!("{}/repos/{}/{}", self.base_url, org, name);
        let full_name = format!("{}/{}", org, name);
        let response = self.client.get(&url).send().await?;
        let repo: GitHubRepository = check_status(response, &full_name)?.json().await?;
        Ok(repo.into())
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn provider_name(&self) -> &str {
        "github"
    }

    fn provider_version(&self) -> String {
        API_VERSION.to_string()
    }

    fn scm_type(&self) -> &str {
        crate::purl::TYPE_GITHUB
    }

    fn repository_purl(&self, repo: &Repository, version: &str) -> Result<Purl, PurlError> {
        Purl::from_github_repo(&repo.full_name(), version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_from_api() {
        let json = r#"{
            "name": "app",
            "owner": {"login": "acme"},
            "clone_url": "https://github.com/acme/app.git",
            "html_url": "https://github.com/acme/app",
            "default_branch": "main",
            "fork": true,
            "archived": false,
            "stargazers_count": 12
        }"#;
        let repo: Repository = serde_json::from_str::<GitHubRepository>(json).unwrap().into();
        assert_eq!(repo.full_name(), "acme/app");
        assert_eq!(repo.default_branch, "main");
        assert!(repo.is_fork);
        assert!(!repo.is_archived);
    }

    #[test]
    fn test_base_url() {
        let provider = GitHubProvider::new(None, None).unwrap();
        assert_eq!(provider.base_url, DEFAULT_API_URL);
        assert!(provider.token().is_none());

        let provider = GitHubProvider::new(Some("t".to_string()), Some("https://ghe.example.com/api/v3/")).unwrap();
        assert_eq!(provider.base_url, "https://ghe.example.com/api/v3");
        assert_eq!(provider.token(), Some("t"));
    }

    #[test]
    fn test_invalid_token() {
        let err = GitHubProvider::new(Some("bad\ntoken".to_string()), None).err().unwrap();
        assert!(matches!(err, ScmError::Config(_)));
    }
}
