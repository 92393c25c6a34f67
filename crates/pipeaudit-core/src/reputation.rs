//! Dependency reputation lookups.

use crate::error::ReputationError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reputation {
    #[serde(default)]
    pub dependencies: Vec<DependencyReputation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyReputation {
    pub purl: String,
    /// 0 (untrusted) to 10 (well maintained).
    pub score: f64,
    #[serde(default)]
    pub flags: Vec<String>,
}

#[async_trait]
pub trait ReputationClient: Send + Sync {
    async fn get_reputation(&self, purls: &[String]) -> Result<Reputation, ReputationError>;
}

#[derive(Debug, Serialize)]
struct ReputationRequest<'a> {
    purls: &'a [String],
}

/// Reputation service reached over HTTP.
pub struct HttpReputationClient {
    client: reqwest::Client,
    url: String,
}

impl HttpReputationClient {
    pub fn new(url: &str) -> Result<Self, ReputationError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("pipeaudit/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ReputationClient for HttpReputationClient {
    async fn get_reputation(&self, purls: &[String]) -> Result<Reputation, ReputationError> {
        if purls.is_empty() {
            return Ok(Reputation::default());
        }
        debug!(url = %self.url, count = purls.len(), "requesting reputation");

        let response = self
            .client
            .post(&self.url)
            .json(&ReputationRequest { purls })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReputationError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reputation_deserialize() {
        let json = r#"{"dependencies": [
            {"purl": "pkg:githubactions/actions/checkout@v4", "score": 9.1},
            {"purl": "pkg:docker/evil/image@latest", "score": 1.0, "flags": ["typosquat"]}
        ]}"#;
        let reputation: Reputation = serde_json::from_str(json).unwrap();
        assert_eq!(reputation.dependencies.len(), 2);
        assert!(reputation.dependencies[0].flags.is_empty());
        assert_eq!(reputation.dependencies[1].flags, vec!["typosquat"]);

        let empty: Reputation = serde_json::from_str("{}").unwrap();
        assert!(empty.dependencies.is_empty());
    }

    #[test]
    fn test_request_body() {
        let purls = vec!["pkg:docker/node@20".to_string()];
        let body = serde_json::to_value(ReputationRequest { purls: &purls }).unwrap();
        assert_eq!(body, serde_json::json!({"purls": ["pkg:docker/node@20"]}));
    }

    #[tokio::test]
    async fn test_empty_request_skips_network() {
        let client = HttpReputationClient::new("http://127.0.0.1:9/reputation").unwrap();
        let reputation = client.get_reputation(&[]).await.unwrap();
        assert!(reputation.dependencies.is_empty());
    }
}
