//! Policy engine boundary: a JSON-in / JSON-out query interface plus the
//! typed documents exchanged across it.

pub mod builtin;
pub mod deps;
pub mod rules;

pub use builtin::BuiltinEngine;

use crate::error::EngineError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Query answering `{packages}` with `{build_dependencies, package_dependencies}`.
pub const QUERY_DEPENDENCIES: &str = "dependencies";

/// Query answering `{packages, reputation, provider, config}` with `{findings, rules}`.
pub const QUERY_FINDINGS: &str = "findings";

#[async_trait]
pub trait PolicyEngine: Send + Sync {
    async fn eval(&self, query: &str, input: serde_json::Value) -> Result<serde_json::Value, EngineError>;
}

/// Evaluate `query` and decode its result.
pub async fn eval_as<T: DeserializeOwned>(
    engine: &dyn PolicyEngine,
    query: &str,
    input: serde_json::Value,
) -> Result<T, EngineError> {
    let output = engine.eval(query, input).await?;
    serde_json::from_value(output).map_err(|source| EngineError::Output {
        query: query.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    #[serde(default)]
    pub build_dependencies: Vec<String>,
    #[serde(default)]
    pub package_dependencies: Vec<String>,
}

/// Severity level for findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Critical => 5,
            Severity::High => 4,
            Severity::Medium => 3,
            Severity::Low => 2,
            Severity::Info => 1,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }
}

/// A rule in the engine's catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub level: Severity,
    #[serde(default)]
    pub refs: Vec<String>,
}

/// Where a finding was observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingMeta {
    pub path: String,
    pub line: usize,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub step: String,
    #[serde(default)]
    pub details: String,
    /// Dependency the finding is about, when there is one.
    #[serde(default)]
    pub dependency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    /// The scanned package the finding belongs to.
    pub purl: String,
    pub level: Severity,
    pub meta: FindingMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingsResult {
    pub findings: Vec<Finding>,
    pub rules: BTreeMap<String, Rule>,
}
