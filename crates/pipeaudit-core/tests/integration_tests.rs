use pipeaudit_core::analyze::Analyzer;
use pipeaudit_core::config::{Config, SkipRule};
use pipeaudit_core::engine::rules;
use pipeaudit_core::engine::{BuiltinEngine, Severity};
use pipeaudit_core::git::GitCli;
use pipeaudit_core::inventory::{Inventory, ProviderInfo};
use pipeaudit_core::models::PackageInsights;
use pipeaudit_core::scanner::InventoryScanner;
use pipeaudit_core::scm::{LocalProvider, ScmClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Get the workspace root (two levels up from CARGO_MANIFEST_DIR of pipeaudit-core).
fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .parent()
        .unwrap() // crates/
        .parent()
        .unwrap() // workspace root
        .join("tests/fixtures")
}

fn monorepo() -> PathBuf {
    fixtures_dir().join("monorepo")
}

fn provider() -> ProviderInfo {
    ProviderInfo {
        name: "local".to_string(),
        version: "test".to_string(),
    }
}

fn inventory(config: Config) -> Inventory {
    Inventory::new(Arc::new(BuiltinEngine::new()), None, config)
}

// ─── Scanner ───

#[test]
fn test_scan_monorepo_finds_every_format() {
    let mut package = PackageInsights::default();
    InventoryScanner::default().run(&monorepo(), &mut package).unwrap();

    let mut workflows: Vec<_> = package
        .github_actions_workflows
        .iter()
        .map(|w| w.path.as_str())
        .collect();
    workflows.sort();
    assert_eq!(
        workflows,
        vec![".github/workflows/ci.yml", ".github/workflows/release.yml"]
    );

    assert_eq!(package.github_actions_metadata.len(), 1);
    assert_eq!(package.github_actions_metadata[0].path, ".github/actions/setup/action.yml");
    assert_eq!(package.azure_pipelines.len(), 1);
    assert_eq!(package.pipeline_as_code_tekton.len(), 1);
}

#[test]
fn test_gitlab_include_cycle_terminates() {
    let mut package = PackageInsights::default();
    InventoryScanner::default().run(&monorepo(), &mut package).unwrap();

    let paths: Vec<_> = package.gitlabci_configs.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec![".gitlab-ci.yml", "ci/build.yml"]);
}

#[test]
fn test_workflow_details() {
    let mut package = PackageInsights::default();
    InventoryScanner::default().run(&monorepo(), &mut package).unwrap();

    let ci = package
        .github_actions_workflows
        .iter()
        .find(|w| w.path.ends_with("ci.yml"))
        .unwrap();
    let job_ids: Vec<_> = ci.jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(job_ids, vec!["test", "lint"]);
    assert_eq!(ci.jobs[1].runs_on, vec!["self-hosted", "linux"]);
    assert_eq!(ci.jobs[0].steps.len(), 4);
    assert_eq!(ci.jobs[0].steps[0].uses, "actions/checkout@v4");
}

// ─── Inventory ───

#[tokio::test]
async fn test_inventory_dependencies() {
    let inventory = inventory(Config::default());
    let package = inventory
        .scan_package(PackageInsights::default(), &monorepo())
        .await
        .unwrap();

    let build = &package.build_dependencies;
    for expected in [
        "pkg:githubactions/actions/checkout@v4",
        "pkg:githubactions/some-org/setup-tool@main",
        "pkg:githubactions/acme/shared-workflows@a5ac7e51b41094c92402da3b24376905380afc29#.github/workflows/publish.yml",
        "pkg:docker/node@20",
        "pkg:docker/alpine@3.19",
        "pkg:docker/python@3.12",
        "pkg:docker/golang@1.22",
        "pkg:gitlabci/platform/templates@main#security.yml",
        "pkg:azurepipelinestask/NodeTool@0",
        "pkg:tekton/task/golang-test@0.2",
    ] {
        assert!(build.iter().any(|d| d == expected), "missing {}", expected);
    }

    let mut sorted = build.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(&sorted, build);

    assert_eq!(
        package.package_dependencies,
        vec!["pkg:githubactions/actions/setup-node@v4"]
    );
}

#[tokio::test]
async fn test_inventory_findings() {
    let inventory = inventory(Config::default());
    inventory
        .scan_package(PackageInsights::default(), &monorepo())
        .await
        .unwrap();
    let result = inventory.findings(&provider()).await.unwrap();

    let compromised: Vec<_> = result
        .findings
        .iter()
        .filter(|f| f.rule_id == rules::KNOWN_COMPROMISED_ACTION)
        .collect();
    assert_eq!(compromised.len(), 1);
    assert_eq!(compromised[0].level, Severity::Critical);
    assert_eq!(compromised[0].meta.path, ".github/workflows/ci.yml");
    assert_eq!(compromised[0].meta.line, 26);
    assert_eq!(compromised[0].meta.job, "lint");

    assert!(result.findings.iter().any(|f| {
        f.rule_id == rules::UNPINNED_ACTION && f.meta.dependency == "pkg:githubactions/some-org/setup-tool@main"
    }));
    assert!(result
        .findings
        .iter()
        .any(|f| f.rule_id == rules::UNPINNED_INCLUDE && f.meta.path == ".gitlab-ci.yml"));

    // SHA-pinned and first-party references are never reported.
    assert!(!result
        .findings
        .iter()
        .any(|f| f.meta.dependency.contains("shared-workflows") || f.meta.dependency.contains("actions/checkout")));
}

#[tokio::test]
async fn test_skip_rules_suppress_findings() {
    let config = Config {
        skip: vec![
            SkipRule {
                level: Some(Severity::Low),
                ..Default::default()
            },
            SkipRule {
                rule: Some(rules::UNPINNED_INCLUDE.to_string()),
                path: Some("*.yml".to_string()),
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let inventory = inventory(config);
    inventory
        .scan_package(PackageInsights::default(), &monorepo())
        .await
        .unwrap();
    let result = inventory.findings(&provider()).await.unwrap();

    assert!(!result.findings.is_empty());
    assert!(result.findings.iter().all(|f| f.level > Severity::Low));
    assert!(!result.findings.iter().any(|f| f.rule_id == rules::UNPINNED_INCLUDE));
}

// ─── Analyzer ───

#[tokio::test]
async fn test_analyze_local_fixture() {
    let config = Config::default();
    let analyzer = Analyzer::new(
        Arc::new(ScmClient::Local(LocalProvider)),
        Arc::new(GitCli::default()),
        Arc::new(inventory(config.clone())),
        config,
    );

    let report = analyzer.analyze_local(&monorepo()).await.unwrap();
    assert_eq!(report.analyzed, 1);
    assert_eq!(report.packages.len(), 1);
    assert_eq!(report.packages[0].purl, "pkg:generic/monorepo");
    assert_eq!(report.packages[0].manifest_count(), 7);
    assert!(!report.findings.findings.is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["packages"][0]["purl"], "pkg:generic/monorepo");
}
