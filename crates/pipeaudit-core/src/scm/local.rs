use super::{Repository, RepositoryPage, ScmProvider};
use crate::error::ScmError;
use crate::purl::{self, Purl, PurlError};
use async_trait::async_trait;

/// Provider for directories on disk. There is nothing to list or clone.
#[derive(Debug, Clone, Default)]
pub struct LocalProvider;

#[async_trait]
impl ScmProvider for LocalProvider {
    async fn list_repositories(&self, _org: &str, _page: u32) -> Result<RepositoryPage, ScmError> {
        Err(ScmError::Unsupported {
            provider: "local",
            operation: "list_repositories",
        })
    }

    async fn get_repository(&self, _org: &str, _name: &str) -> Result<Repository, ScmError> {
        Err(ScmError::Unsupported {
            provider: "local",
            operation: "get_repository",
        })
    }

    fn token(&self) -> Option<&str> {
        None
    }

    fn provider_name(&self) -> &str {
        "local"
    }

    fn provider_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn scm_type(&self) -> &str {
        purl::TYPE_GENERIC
    }

    fn repository_purl(&self, repo: &Repository, version: &str) -> Result<Purl, PurlError> {
        Ok(Purl::new(purl::TYPE_GENERIC, "", &repo.name, version).normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_unsupported() {
        let err = LocalProvider.list_repositories("acme", 1).await.unwrap_err();
        assert!(matches!(err, ScmError::Unsupported { provider: "local", .. }));
    }

    #[test]
    fn test_generic_purl() {
        let repo = Repository {
            name: "my-project".to_string(),
            ..Default::default()
        };
        assert_eq!(
            LocalProvider.repository_purl(&repo, "").unwrap().to_string(),
            "pkg:generic/my-project"
        );
    }
}
