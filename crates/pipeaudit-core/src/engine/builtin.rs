//! In-process policy engine answering the dependency and findings queries.

use super::{deps, rules, DependencyReport, Finding, FindingsResult, PolicyEngine, QUERY_DEPENDENCIES, QUERY_FINDINGS};
use crate::config::SkipRule;
use crate::error::EngineError;
use crate::models::PackageInsights;
use crate::reputation::Reputation;
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct BuiltinEngine;

impl BuiltinEngine {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct DependenciesInput {
    packages: Vec<PackageInsights>,
}

#[derive(Debug, Deserialize)]
struct FindingsInput {
    packages: Vec<PackageInsights>,
    #[serde(default)]
    reputation: Option<Reputation>,
    #[serde(default)]
    config: FindingsConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FindingsConfig {
    skip: Vec<SkipRule>,
    allowed_rules: Vec<String>,
}

fn parse_input<T: DeserializeOwned>(query: &str, input: serde_json::Value) -> Result<T, EngineError> {
    serde_json::from_value(input).map_err(|e| EngineError::Input {
        query: query.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl PolicyEngine for BuiltinEngine {
    async fn eval(&self, query: &str, input: serde_json::Value) -> Result<serde_json::Value, EngineError> {
        match query {
            QUERY_DEPENDENCIES => {
                let input: DependenciesInput = parse_input(query, input)?;
                let report: DependencyReport = deps::infer(&input.packages);
                Ok(serde_json::to_value(report)?)
            }
            QUERY_FINDINGS => {
                let input: FindingsInput = parse_input(query, input)?;
                let all = rules::evaluate(&input.packages, input.reputation.as_ref());
                let total = all.len();
                let findings: Vec<Finding> = all
                    .into_iter()
                    .filter(|f| is_allowed(f, &input.config.allowed_rules))
                    .filter(|f| !input.config.skip.iter().any(|rule| skip_matches(rule, f)))
                    .collect();
                debug!(total, reported = findings.len(), "findings evaluated");
                let result = FindingsResult {
                    findings,
                    rules: rules::catalog(),
                };
                Ok(serde_json::to_value(result)?)
            }
            other => Err(EngineError::UnknownQuery(other.to_string())),
        }
    }
}

fn is_allowed(finding: &Finding, allowed: &[String]) -> bool {
    allowed.is_empty() || allowed.iter().any(|id| *id == finding.rule_id)
}

/// A skip entry matches when every field it sets matches the finding.
fn skip_matches(rule: &SkipRule, finding: &Finding) -> bool {
    if rule.rule.is_none() && rule.path.is_none() && rule.job.is_none() && rule.purl.is_none() && rule.level.is_none() {
        return false;
    }
    if rule.rule.as_ref().is_some_and(|id| *id != finding.rule_id) {
        return false;
    }
    if rule.path.as_ref().is_some_and(|p| !wildcard_match(p, &finding.meta.path)) {
        return false;
    }
    if rule.job.as_ref().is_some_and(|job| *job != finding.meta.job) {
        return false;
    }
    if rule.purl.as_ref().is_some_and(|p| !wildcard_match(p, &finding.purl)) {
        return false;
    }
    if rule.level.is_some_and(|level| finding.level > level) {
        return false;
    }
    true
}

fn wildcard_match(pattern: &str, value: &str) -> bool {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{}$", escaped))
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{eval_as, FindingMeta, Severity};
    use crate::parser::GitHubActionsParser;
    use serde_json::json;

    fn package() -> PackageInsights {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: x\n    container: node:20\n    steps:\n      - uses: some-org/deploy@v1\n      - uses: actions/checkout@v4\n";
        let mut pkg = PackageInsights {
            purl: "pkg:github/acme/app".to_string(),
            ..Default::default()
        };
        pkg.github_actions_workflows
            .push(GitHubActionsParser::decode(yaml, ".github/workflows/ci.yml").unwrap());
        pkg
    }

    fn finding(rule: &str, path: &str, level: Severity) -> Finding {
        Finding {
            rule_id: rule.to_string(),
            purl: "pkg:github/acme/app".to_string(),
            level,
            meta: FindingMeta {
                path: path.to_string(),
                line: 1,
                job: "build".to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_dependencies_query() {
        let engine = BuiltinEngine::new();
        let report: DependencyReport = eval_as(&engine, QUERY_DEPENDENCIES, json!({"packages": [package()]}))
            .await
            .unwrap();
        assert_eq!(
            report.build_dependencies,
            vec![
                "pkg:docker/node@20",
                "pkg:githubactions/actions/checkout@v4",
                "pkg:githubactions/some-org/deploy@v1",
            ]
        );
        assert!(report.package_dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_findings_query() {
        let engine = BuiltinEngine::new();
        let result: FindingsResult = eval_as(
            &engine,
            QUERY_FINDINGS,
            json!({"packages": [package()], "provider": "github", "reputation": null}),
        )
        .await
        .unwrap();
        let ids: Vec<_> = result.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec![rules::UNPINNED_IMAGE, rules::UNPINNED_ACTION]);
        assert!(result.rules.contains_key(rules::UNPINNED_ACTION));
    }

    #[tokio::test]
    async fn test_findings_config_filters() {
        let engine = BuiltinEngine::new();
        let result: FindingsResult = eval_as(
            &engine,
            QUERY_FINDINGS,
            json!({
                "packages": [package()],
                "config": {"allowed_rules": [rules::UNPINNED_ACTION, rules::UNPINNED_IMAGE],
                           "skip": [{"rule": rules::UNPINNED_IMAGE}]}
            }),
        )
        .await
        .unwrap();
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].rule_id, rules::UNPINNED_ACTION);

        let result: FindingsResult = eval_as(
            &engine,
            QUERY_FINDINGS,
            json!({"packages": [package()], "config": {"allowed_rules": ["something_else"]}}),
        )
        .await
        .unwrap();
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn test_bad_input_and_unknown_query() {
        let engine = BuiltinEngine::new();
        let err = engine.eval(QUERY_FINDINGS, json!({"packages": 3})).await.unwrap_err();
        assert!(matches!(err, EngineError::Input { .. }));
        let err = engine.eval("score", json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownQuery(_)));
    }

    #[test]
    fn test_skip_rule_matching() {
        let f = finding(rules::UNPINNED_IMAGE, ".github/workflows/ci.yml", Severity::Low);

        let by_path = SkipRule {
            path: Some(".github/workflows/*".to_string()),
            ..Default::default()
        };
        assert!(skip_matches(&by_path, &f));

        let other_rule = SkipRule {
            rule: Some(rules::UNPINNED_ACTION.to_string()),
            path: Some(".github/workflows/*".to_string()),
            ..Default::default()
        };
        assert!(!skip_matches(&other_rule, &f));

        let by_level = SkipRule {
            level: Some(Severity::Low),
            ..Default::default()
        };
        assert!(skip_matches(&by_level, &f));
        assert!(!skip_matches(&by_level, &finding(rules::UNPINNED_IMAGE, "x", Severity::Medium)));

        let other_job = SkipRule {
            job: Some("deploy".to_string()),
            ..Default::default()
        };
        assert!(!skip_matches(&other_job, &f));
        assert!(!skip_matches(&SkipRule::default(), &f));
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*.yml", "ci.yml"));
        assert!(wildcard_match("pkg:github/acme/*", "pkg:github/acme/app"));
        assert!(!wildcard_match("ci.yml", "ci.yaml"));
        assert!(wildcard_match("a.b", "a.b"));
        assert!(!wildcard_match("a.b", "axb"));
    }
}
