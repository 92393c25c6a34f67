//! Supply-chain rule catalog of the built-in engine: pinning and reputation.

use super::deps::{self, DependencyUse, UseKind};
use super::{Finding, FindingMeta, Rule, Severity};
use crate::models::PackageInsights;
use crate::purl::{self, Purl};
use crate::reputation::Reputation;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

pub const UNPINNED_ACTION: &str = "unpinned_action";
pub const KNOWN_COMPROMISED_ACTION: &str = "known_compromised_action";
pub const UNPINNED_IMAGE: &str = "unpinned_container_image";
pub const UNPINNED_INCLUDE: &str = "unpinned_include";
pub const LOW_REPUTATION: &str = "low_reputation_dependency";

/// Reputation scores below this are reported (scores run from 0 to 10).
pub const REPUTATION_THRESHOLD: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PinningRisk {
    Sha,    // full commit SHA or image digest
    Tag,    // tags can be moved
    Branch, // follows a branch head
    Latest, // no version at all
    Unknown,
}

impl PinningRisk {
    fn severity(&self) -> Severity {
        match self {
            PinningRisk::Sha => Severity::Info,
            PinningRisk::Tag => Severity::Low,
            PinningRisk::Branch => Severity::High,
            PinningRisk::Latest | PinningRisk::Unknown => Severity::High,
        }
    }

    fn label(&self) -> &str {
        match self {
            PinningRisk::Sha => "SHA-pinned",
            PinningRisk::Tag => "tag-pinned",
            PinningRisk::Branch => "branch-pinned",
            PinningRisk::Latest => "unpinned (latest)",
            PinningRisk::Unknown => "unknown version",
        }
    }
}

fn sha_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(sha256:[0-9a-f]{64}|[0-9a-f]{40})$").unwrap())
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^v?\d+(\.\d+)*([-+.][0-9A-Za-z.-]+)?$").unwrap())
}

fn branch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(main|master|develop|dev|trunk|HEAD|release.*)$").unwrap())
}

pub(crate) fn classify_pinning(version: &str) -> PinningRisk {
    let version = version.trim();
    if version.is_empty() || version == "latest" || version == "~latest" {
        return PinningRisk::Latest;
    }
    if sha_pattern().is_match(version) {
        return PinningRisk::Sha;
    }
    if tag_pattern().is_match(version) {
        return PinningRisk::Tag;
    }
    if branch_pattern().is_match(version) {
        return PinningRisk::Branch;
    }
    PinningRisk::Unknown
}

/// Known compromised or high-risk actions.
const KNOWN_RISKY_ACTIONS: &[(&str, &str)] = &[
    (
        "tj-actions/changed-files",
        "Previously compromised (CVE-2025-30066). Pin to verified SHA.",
    ),
    (
        "reviewdog/action-setup",
        "Previously targeted in supply chain attack (CVE-2025-30154). Verify SHA.",
    ),
];

/// Owners whose actions are maintained by the platform itself.
const FIRST_PARTY_OWNERS: &[&str] = &["actions", "github"];

pub fn catalog() -> BTreeMap<String, Rule> {
    let rules = [
        Rule {
            id: UNPINNED_ACTION.to_string(),
            title: "Third-party action not pinned to a commit SHA".to_string(),
            description: "Tags and branches can be moved by the action maintainer, \
                          potentially injecting malicious code into the build."
                .to_string(),
            level: Severity::Medium,
            refs: vec![
                "https://docs.github.com/en/actions/security-guides/security-hardening-for-github-actions#using-third-party-actions".to_string(),
            ],
        },
        Rule {
            id: KNOWN_COMPROMISED_ACTION.to_string(),
            title: "Action with a known supply chain compromise".to_string(),
            description: "The action was compromised in the past; only verified SHAs are safe."
                .to_string(),
            level: Severity::Critical,
            refs: Vec::new(),
        },
        Rule {
            id: UNPINNED_IMAGE.to_string(),
            title: "Container image not pinned to a digest".to_string(),
            description: "Image tags are mutable; the image that runs can change between builds."
                .to_string(),
            level: Severity::Low,
            refs: Vec::new(),
        },
        Rule {
            id: UNPINNED_INCLUDE.to_string(),
            title: "Pipeline include not pinned to an immutable version".to_string(),
            description: "Remote includes and unpinned project or component includes can \
                          change the pipeline definition without a change in this repository."
                .to_string(),
            level: Severity::Medium,
            refs: vec!["https://docs.gitlab.com/ee/ci/yaml/includes.html".to_string()],
        },
        Rule {
            id: LOW_REPUTATION.to_string(),
            title: "Dependency with low reputation".to_string(),
            description: "The reputation service scored this dependency below the threshold."
                .to_string(),
            level: Severity::High,
            refs: Vec::new(),
        },
    ];
    rules.into_iter().map(|r| (r.id.clone(), r)).collect()
}

/// Evaluate every rule against every package.
pub fn evaluate(packages: &[PackageInsights], reputation: Option<&Reputation>) -> Vec<Finding> {
    let scores: HashMap<&str, f64> = reputation
        .map(|r| {
            r.dependencies
                .iter()
                .map(|d| (d.purl.as_str(), d.score))
                .collect()
        })
        .unwrap_or_default();

    let mut findings = Vec::new();
    for package in packages {
        for dep in deps::collect(package) {
            assess_use(package, &dep, &mut findings);
            let key = dep.purl.to_string();
            if let Some(score) = scores.get(key.as_str()).copied() {
                if score < REPUTATION_THRESHOLD {
                    findings.push(finding(
                        package,
                        &dep,
                        LOW_REPUTATION,
                        Severity::High,
                        format!("'{}' has a reputation score of {:.1}", dep.reference, score),
                    ));
                }
            }
        }
    }
    findings
}

fn finding(package: &PackageInsights, dep: &DependencyUse, rule: &str, level: Severity, details: String) -> Finding {
    Finding {
        rule_id: rule.to_string(),
        purl: package.purl.clone(),
        level,
        meta: FindingMeta {
            path: dep.path.clone(),
            line: dep.line,
            job: dep.job.clone(),
            step: dep.step.clone(),
            details,
            dependency: dep.purl.to_string(),
        },
    }
}

fn assess_use(package: &PackageInsights, dep: &DependencyUse, out: &mut Vec<Finding>) {
    match dep.kind {
        UseKind::Action | UseKind::ReusableWorkflow => {
            let full_name = dep.purl.full_name();
            for (risky_action, warning) in KNOWN_RISKY_ACTIONS {
                if full_name == *risky_action {
                    out.push(finding(
                        package,
                        dep,
                        KNOWN_COMPROMISED_ACTION,
                        Severity::Critical,
                        format!("Uses '{}'. {}", dep.reference, warning),
                    ));
                }
            }

            let first_party = FIRST_PARTY_OWNERS.contains(&dep.purl.namespace.as_str());
            let pinning = classify_pinning(&dep.purl.version);
            if !first_party && pinning != PinningRisk::Sha {
                out.push(finding(
                    package,
                    dep,
                    UNPINNED_ACTION,
                    pinning.severity(),
                    format!(
                        "'{}' is {}. Pin to a full SHA: `{}@<full-sha-hash>`.",
                        dep.reference,
                        pinning.label(),
                        dep.reference.split('@').next().unwrap_or(&dep.reference)
                    ),
                ));
            }
        }
        UseKind::Image => {
            if classify_pinning(&dep.purl.version) != PinningRisk::Sha {
                let level = if dep.purl.version.is_empty() || dep.purl.version == "latest" {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                out.push(finding(
                    package,
                    dep,
                    UNPINNED_IMAGE,
                    level,
                    format!("Image '{}' is not pinned to a digest", dep.reference),
                ));
            }
        }
        UseKind::Include | UseKind::Component => {
            if let Some((level, reason)) = include_risk(&dep.purl) {
                out.push(finding(
                    package,
                    dep,
                    UNPINNED_INCLUDE,
                    level,
                    format!("Include '{}' {}", dep.reference, reason),
                ));
            }
        }
        UseKind::Task | UseKind::Pipeline => {}
    }
}

fn include_risk(purl: &Purl) -> Option<(Severity, &'static str)> {
    if purl.purl_type != purl::TYPE_GITLAB_CI {
        return None;
    }
    match purl.namespace.as_str() {
        "template" => None,
        "remote" => Some((Severity::Medium, "is fetched from a URL whose content can change")),
        _ => match classify_pinning(&purl.version) {
            PinningRisk::Sha => None,
            PinningRisk::Tag => None,
            PinningRisk::Latest => Some((Severity::High, "has no version and follows the default branch")),
            PinningRisk::Branch => Some((Severity::High, "follows a branch")),
            PinningRisk::Unknown => Some((Severity::Medium, "uses a ref that may be mutable")),
        },
    }
}
