//! The shared package inventory built up by a scan run.

use crate::config::Config;
use crate::engine::{eval_as, DependencyReport, FindingsResult, PolicyEngine, QUERY_DEPENDENCIES, QUERY_FINDINGS};
use crate::error::{InventoryError, ScanError};
use crate::models::PackageInsights;
use crate::reputation::ReputationClient;
use crate::scanner::InventoryScanner;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Name and version of the source the packages were collected from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderInfo {
    pub name: String,
    pub version: String,
}

pub struct Inventory {
    engine: Arc<dyn PolicyEngine>,
    reputation: Option<Arc<dyn ReputationClient>>,
    config: Config,
    packages: Mutex<Vec<PackageInsights>>,
}

impl Inventory {
    pub fn new(
        engine: Arc<dyn PolicyEngine>,
        reputation: Option<Arc<dyn ReputationClient>>,
        config: Config,
    ) -> Self {
        Self {
            engine,
            reputation,
            config,
            packages: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PackageInsights>> {
        self.packages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Scan `workdir` into `stub`, infer its dependencies and record it.
    pub async fn scan_package(&self, stub: PackageInsights, workdir: &Path) -> Result<PackageInsights, ScanError> {
        let root: PathBuf = workdir.to_path_buf();
        let mut package = tokio::task::spawn_blocking(move || {
            let mut package = stub;
            InventoryScanner::default().run(&root, &mut package).map(|_| package)
        })
        .await
        .map_err(|e| ScanError::Join(e.to_string()))??;

        let report: DependencyReport = eval_as(
            self.engine.as_ref(),
            QUERY_DEPENDENCIES,
            json!({ "packages": [&package] }),
        )
        .await?;

        package.build_dependencies = sorted_unique(report.build_dependencies);
        package.package_dependencies = sorted_unique(report.package_dependencies);
        package.updated_at = Some(Utc::now());

        debug!(
            purl = %package.purl,
            manifests = package.manifest_count(),
            build_dependencies = package.build_dependencies.len(),
            "package scanned"
        );
        self.add_package(package.clone());
        Ok(package)
    }

    pub fn add_package(&self, package: PackageInsights) {
        self.lock().push(package);
    }

    pub fn packages(&self) -> Vec<PackageInsights> {
        self.lock().clone()
    }

    /// Evaluate the findings query over every package in the inventory.
    pub async fn findings(&self, provider: &ProviderInfo) -> Result<FindingsResult, InventoryError> {
        let packages = self.packages();

        let purls: BTreeSet<String> = packages
            .iter()
            .flat_map(|p| p.build_dependencies.iter().chain(&p.package_dependencies))
            .cloned()
            .collect();

        let reputation = match &self.reputation {
            Some(client) => {
                let purls: Vec<String> = purls.into_iter().collect();
                info!(dependencies = purls.len(), "fetching dependency reputation");
                Some(client.get_reputation(&purls).await?)
            }
            None => None,
        };

        let input = json!({
            "packages": packages,
            "reputation": reputation,
            "provider": { "name": provider.name, "version": provider.version },
            "config": {
                "skip": self.config.skip,
                "allowed_rules": self.config.allowed_rules,
            },
        });
        Ok(eval_as(self.engine.as_ref(), QUERY_FINDINGS, input).await?)
    }
}

fn sorted_unique(values: Vec<String>) -> Vec<String> {
    values.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}
