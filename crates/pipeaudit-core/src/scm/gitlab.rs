use super::{check_status, Repository, RepositoryPage, ScmProvider, PAGE_SIZE};
use crate::error::ScmError;
use crate::purl::{Purl, PurlError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://gitlab.com/api/v4";

pub struct GitLabProvider {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GitLabProject {
    path: String,
    namespace: GitLabNamespace,
    http_url_to_repo: String,
    web_url: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    forked_from_project: Option<serde_json::Value>,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
struct GitLabNamespace {
    full_path: String,
}

impl From<GitLabProject> for Repository {
    fn from(project: GitLabProject) -> Self {
        Repository {
            namespace: project.namespace.full_path,
            name: project.path,
            clone_url: project.http_url_to_repo,
            html_url: project.web_url,
            default_branch: project.default_branch.unwrap_or_default(),
            is_fork: project.forked_from_project.is_some_and(|p| !p.is_null()),
            is_archived: project.archived,
        }
    }
}

/// Percent-encode a namespaced path for use as a single URL segment.
fn encode_path(path: &str) -> String {
    url::form_urlencoded::byte_serialize(path.as_bytes()).collect()
}

impl GitLabProvider {
    pub fn new(token: Option<String>, base_url: Option<&str>) -> Result<Self, ScmError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("pipeaudit/", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(ref t) = token {
            headers.insert(
                HeaderName::from_static("private-token"),
                HeaderValue::from_str(t).map_err(|_| ScmError::Config("invalid GitLab token".to_string()))?,
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

    /// Host of the instance, used as the purl `repository_url` for self-hosted GitLab.
    fn instance_host(&self) -> Option<String> {
        let host = url::Url::parse(&self.base_url).ok()?.host_str()?.to_string();
        (host != "gitlab.com").then_some(host)
    }
}

fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl ScmProvider for GitLabProvider {
    async fn list_repositories(&self, org: &str, page: u32) -> Result<RepositoryPage, ScmError> {
        let url = format!("{}/groups/{}/projects", self.base_url, encode_path(org));
        debug!(group = org, page, "listing GitLab projects");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("include_subgroups", "true".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await?;
        let response = check_status(response, org)?;
        let next = next_page(response.headers());
        let projects: Vec<GitLabProject> = response.json().await?;

        Ok(RepositoryPage {
            repositories: projects.into_iter().map(Repository::from).collect(),
            next_page: next,
        })
    }

    async fn get_repository(&self, org: &str, name: &str) -> Result<Repository, ScmError> {
        let full_name = format!("{}/{}", org, name);
        let url = format!("{}/projects/{}", self.base_url, encode_path(&full_name));
        let response = self.client.get(&url).send().await?;
        let project: GitLabProject = check_status(response, &full_name)?.json().await?;
        Ok(project.into())
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn provider_name(&self) -> &str {
        "gitlab"
    }

    fn provider_version(&self) -> String {
        "v4".to_string()
    }

    fn scm_type(&self) -> &str {
        crate::purl::TYPE_GITLAB
    }

    fn repository_purl(&self, repo: &Repository, version: &str) -> Result<Purl, PurlError> {
        let purl = Purl::from_gitlab_project(&repo.full_name(), version)?;
        Ok(match self.instance_host() {
            Some(host) => purl.with_qualifier("repository_url", &host),
            None => purl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_from_api() {
        let json = r#"{
            "path": "api",
            "namespace": {"full_path": "platform/backend"},
            "http_url_to_repo": "https://gitlab.com/platform/backend/api.git",
            "web_url": "https://gitlab.com/platform/backend/api",
            "default_branch": "main",
            "forked_from_project": null,
            "archived": true
        }"#;
        let repo: Repository = serde_json::from_str::<GitLabProject>(json).unwrap().into();
        assert_eq!(repo.full_name(), "platform/backend/api");
        assert!(!repo.is_fork);
        assert!(repo.is_archived);
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("platform/backend"), "platform%2Fbackend");
    }

    #[test]
    fn test_next_page_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_page(&headers), None);
        headers.insert("x-next-page", HeaderValue::from_static(""));
        assert_eq!(next_page(&headers), None);
        headers.insert("x-next-page", HeaderValue::from_static("3"));
        assert_eq!(next_page(&headers), Some(3));
    }

    #[test]
    fn test_self_hosted_purl() {
        let repo = Repository {
            namespace: "team".to_string(),
            name: "svc".to_string(),
            ..Default::default()
        };
        let hosted = GitLabProvider::new(None, None).unwrap();
        assert_eq!(hosted.repository_purl(&repo, "").unwrap().to_string(), "pkg:gitlab/team/svc");

        let own = GitLabProvider::new(None, Some("https://git.example.com/api/v4")).unwrap();
        assert_eq!(
            own.repository_purl(&repo, "").unwrap().to_string(),
            "pkg:gitlab/team/svc?repository_url=git.example.com"
        );
    }
}
