//! Organization, repository and local-directory analysis runs.

use crate::config::Config;
use crate::engine::FindingsResult;
use crate::error::{AnalyzeError, ScmError};
use crate::git::GitClient;
use crate::inventory::{Inventory, ProviderInfo};
use crate::models::PackageInsights;
use crate::purl::{self, Purl};
use crate::scm::{Repository, ScmProvider};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prefix of every temporary checkout directory.
pub const TEMP_PREFIX: &str = "pipeaudit-";

/// Permits taken by one repository worker.
const REPOSITORY_WEIGHT: u32 = 1;

/// Outcome of an analysis run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub packages: Vec<PackageInsights>,
    pub findings: FindingsResult,
    pub analyzed: usize,
    pub skipped: usize,
}

pub struct Analyzer {
    scm: Arc<dyn ScmProvider>,
    git: Arc<dyn GitClient>,
    inventory: Arc<Inventory>,
    config: Config,
    cancel: CancellationToken,
    progress: Arc<AtomicUsize>,
}

/// Everything a spawned repository worker needs.
#[derive(Clone)]
struct RepositoryWorker {
    scm: Arc<dyn ScmProvider>,
    git: Arc<dyn GitClient>,
    inventory: Arc<Inventory>,
    cancel: CancellationToken,
    progress: Arc<AtomicUsize>,
}

impl Analyzer {
    pub fn new(
        scm: Arc<dyn ScmProvider>,
        git: Arc<dyn GitClient>,
        inventory: Arc<Inventory>,
        config: Config,
    ) -> Self {
        Self {
            scm,
            git,
            inventory,
            config,
            cancel: CancellationToken::new(),
            progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of repositories scanned so far.
    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::SeqCst)
    }

    fn worker(&self) -> RepositoryWorker {
        RepositoryWorker {
            scm: self.scm.clone(),
            git: self.git.clone(),
            inventory: self.inventory.clone(),
            cancel: self.cancel.clone(),
            progress: self.progress.clone(),
        }
    }

    fn provider(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.scm.provider_name().to_string(),
            version: self.scm.provider_version(),
        }
    }

    async fn report(&self, analyzed: usize, skipped: usize) -> Result<AnalysisReport, AnalyzeError> {
        let findings = self.inventory.findings(&self.provider()).await?;
        Ok(AnalysisReport {
            packages: self.inventory.packages(),
            findings,
            analyzed,
            skipped,
        })
    }

    /// Analyze every repository of `org`, at most `max_concurrency` at a time.
    ///
    /// Repository failures are logged and counted as skipped. Listing
    /// failures and cancellation abort the run.
    pub async fn analyze_org(&self, org: &str) -> Result<AnalysisReport, AnalyzeError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut workers = JoinSet::new();
        let mut filtered = 0;
        let mut page = 1;

        loop {
            let listing = self
                .scm
                .list_repositories(org, page)
                .await
                .map_err(AnalyzeError::Listing)?;
            debug!(org, page, count = listing.repositories.len(), "repository page listed");

            for repo in listing.repositories {
                if self.config.ignore_forks && (repo.is_fork || repo.is_archived) {
                    debug!(repo = %repo.full_name(), "skipping fork or archived repository");
                    filtered += 1;
                    continue;
                }

                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(AnalyzeError::Admission),
                    permit = semaphore.clone().acquire_many_owned(REPOSITORY_WEIGHT) => {
                        permit.map_err(|_| AnalyzeError::Admission)?
                    }
                };

                let worker = self.worker();
                workers.spawn(async move {
                    let _permit = permit;
                    let name = repo.full_name();
                    (name, worker.analyze(repo, None).await)
                });
            }

            match listing.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        let mut analyzed = 0;
        let mut skipped = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(_))) => analyzed += 1,
                Ok((repo, Err(e))) => {
                    warn!(repo = %repo, error = %e, "repository analysis failed, skipping");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "repository worker panicked, skipping");
                    skipped += 1;
                }
            }
        }
        info!(org, analyzed, skipped, filtered, "organization analysis finished");

        self.report(analyzed, skipped).await
    }

    /// Analyze a single `owner/name` repository at `git_ref` or its default branch.
    pub async fn analyze_repo(&self, full_name: &str, git_ref: Option<&str>) -> Result<AnalysisReport, AnalyzeError> {
        let (org, name) = full_name
            .trim_matches('/')
            .rsplit_once('/')
            .ok_or_else(|| AnalyzeError::Lookup(ScmError::NotFound(full_name.to_string())))?;
        let repo = self
            .scm
            .get_repository(org, name)
            .await
            .map_err(AnalyzeError::Lookup)?;

        self.worker().analyze(repo, git_ref.map(str::to_string)).await?;
        self.report(1, 0).await
    }

    /// Analyze a directory already on disk.
    pub async fn analyze_local(&self, path: &Path) -> Result<AnalysisReport, AnalyzeError> {
        let root = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let dirname = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "local".to_string());

        let mut stub = PackageInsights::new(&Purl::new(purl::TYPE_GENERIC, "", &dirname, "").normalized());
        stub.source_scm_type = purl::TYPE_GENERIC.to_string();
        match self.git.commit_sha(&root).await {
            Ok(sha) => {
                stub.source_git_commit_sha = sha;
                stub.source_git_ref = self.git.head_branch(&root).await.unwrap_or_default();
                stub.last_commit_at = self.git.last_commit_date(&root).await.ok();
            }
            Err(e) => debug!(path = %root.display(), error = %e, "no git provenance"),
        }

        self.inventory.scan_package(stub, &root).await?;
        self.progress.fetch_add(1, Ordering::SeqCst);
        self.report(1, 0).await
    }
}

impl RepositoryWorker {
    async fn analyze(&self, repo: Repository, git_ref: Option<String>) -> Result<PackageInsights, AnalyzeError> {
        let workspace = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir()
            .map_err(AnalyzeError::TempDir)?;
        let checkout = workspace.path().join("checkout");

        let url = self.scm.clone_url(&repo);
        self.git
            .clone_repository(&url, self.scm.token(), git_ref.as_deref(), &checkout, &self.cancel)
            .await?;

        let sha = self.git.commit_sha(&checkout).await?;
        let branch = self.git.head_branch(&checkout).await?;
        let last_commit_at = self.git.last_commit_date(&checkout).await.ok();
        let version = git_ref.unwrap_or(branch);

        let purl = self.scm.repository_purl(&repo, &version)?;
        let mut stub = PackageInsights::new(&purl);
        stub.source_scm_type = self.scm.scm_type().to_string();
        stub.source_git_repo = repo.full_name();
        stub.source_git_ref = version;
        stub.source_git_commit_sha = sha;
        stub.last_commit_at = last_commit_at;

        let package = self.inventory.scan_package(stub, &checkout).await?;
        let done = self.progress.fetch_add(1, Ordering::SeqCst) + 1;
        info!(repo = %repo.full_name(), done, "repository analyzed");

        if let Err(e) = workspace.close() {
            warn!(repo = %repo.full_name(), error = %e, "failed to remove temporary checkout");
        }
        Ok(package)
    }
}

/// Remove leftover checkout directories from the system temp dir.
pub fn cleanup_temp_dirs() -> usize {
    cleanup_temp_dirs_in(&std::env::temp_dir())
}

pub fn cleanup_temp_dirs_in(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let is_checkout = entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX);
        if !is_checkout || !entry.path().is_dir() {
            continue;
        }
        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove temporary directory"),
        }
    }
    removed
}
