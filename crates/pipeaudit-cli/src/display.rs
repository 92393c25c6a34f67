use colored::*;
use pipeaudit_core::analyze::AnalysisReport;
use pipeaudit_core::engine::{Finding, Rule, Severity};
use pipeaudit_core::models::PackageInsights;
use std::collections::BTreeMap;

/// Print a full inventory and findings report to the terminal.
pub fn print_report(report: &AnalysisReport) {
    println!();
    println!(
        "{}",
        format!(
            " pipeaudit v{}: {} package(s) scanned",
            env!("CARGO_PKG_VERSION"),
            report.packages.len()
        )
        .bold()
    );
    println!();

    println!(" {}", "Inventory".bold().underline());
    for package in &report.packages {
        print_package(package);
    }
    if report.packages.is_empty() {
        println!(" {} nothing scanned", "|-".dimmed());
    }
    println!();

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    let findings = &report.findings.findings;
    if findings.is_empty() {
        println!(" {} No supply-chain issues detected!", "OK".green().bold());
    } else {
        let mut sorted: Vec<&Finding> = findings.iter().collect();
        sorted.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then_with(|| a.meta.path.cmp(&b.meta.path))
                .then_with(|| a.meta.line.cmp(&b.meta.line))
        });
        for finding in sorted {
            print_finding(finding, &report.findings.rules);
            println!();
        }
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    println!(" {}", "Summary".bold().underline());
    let build: usize = report.packages.iter().map(|p| p.build_dependencies.len()).sum();
    let package: usize = report.packages.iter().map(|p| p.package_dependencies.len()).sum();
    println!(
        " {} Dependencies: {} build, {} package",
        "|-".dimmed(),
        build,
        package
    );
    if report.skipped > 0 {
        println!(
            " {} Repositories skipped: {}",
            "|-".dimmed(),
            report.skipped.to_string().yellow()
        );
    }

    let critical = count(findings, Severity::Critical);
    let high = count(findings, Severity::High);
    println!(
        " {} Findings: {} critical, {} high, {} other",
        "|-".dimmed(),
        if critical > 0 {
            critical.to_string().red().bold().to_string()
        } else {
            "0".to_string()
        },
        if high > 0 {
            high.to_string().yellow().bold().to_string()
        } else {
            "0".to_string()
        },
        findings.len() - critical - high,
    );
    println!();
}

fn count(findings: &[Finding], level: Severity) -> usize {
    findings.iter().filter(|f| f.level == level).count()
}

fn print_package(package: &PackageInsights) {
    println!(
        " {} {} ({} manifests, {} dependencies)",
        "|-".dimmed(),
        package.purl.cyan(),
        package.manifest_count(),
        package.build_dependencies.len() + package.package_dependencies.len()
    );
    if !package.source_git_commit_sha.is_empty() {
        println!(
            "    {} {} @ {}",
            "|".dimmed(),
            package.source_git_ref,
            package.source_git_commit_sha.dimmed()
        );
    }
}

fn severity_tag(level: Severity) -> String {
    match level {
        Severity::Critical => format!(" {} ", level.symbol())
            .on_red()
            .white()
            .bold()
            .to_string(),
        Severity::High => format!(" {} ", level.symbol())
            .on_yellow()
            .black()
            .bold()
            .to_string(),
        Severity::Medium => format!(" {} ", level.symbol())
            .on_blue()
            .white()
            .bold()
            .to_string(),
        Severity::Low | Severity::Info => format!(" {} ", level.symbol()).dimmed().to_string(),
    }
}

fn print_finding(finding: &Finding, rules: &BTreeMap<String, Rule>) {
    let title = rules
        .get(&finding.rule_id)
        .map(|r| r.title.as_str())
        .unwrap_or(finding.rule_id.as_str());

    println!(" {} {}", severity_tag(finding.level), title.bold());
    println!(
        "   {} {}:{}{}",
        "|".dimmed(),
        finding.meta.path,
        finding.meta.line,
        if finding.meta.job.is_empty() {
            String::new()
        } else {
            format!(" (job {})", finding.meta.job)
        }
    );
    println!("   {} {}", "|".dimmed(), finding.meta.details);
    println!("   {} {}", "|".dimmed(), finding.purl.dimmed());

    if let Some(link) = rules.get(&finding.rule_id).and_then(|r| r.refs.first()) {
        println!("   {} See: {}", "|".dimmed(), link.cyan());
    }
}
