mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pipeaudit_core::analyze::{self, AnalysisReport, Analyzer};
use pipeaudit_core::config::{Config, ScmKind};
use pipeaudit_core::engine::BuiltinEngine;
use pipeaudit_core::git::GitCli;
use pipeaudit_core::inventory::Inventory;
use pipeaudit_core::reputation::{HttpReputationClient, ReputationClient};
use pipeaudit_core::scm::{LocalProvider, ScmClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pipeaudit",
    version,
    about = "CI/CD pipeline supply-chain scanner",
    long_about = "Inventory the actions, images, includes and tasks your CI/CD pipelines depend on, across a directory, a repository or a whole organization, and report risky dependencies."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Config file (defaults to .pipeaudit.toml in the scanned directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct RemoteArgs {
    /// Source control provider
    #[arg(long, value_enum)]
    scm: Option<ScmArg>,

    /// API base URL for self-hosted instances
    #[arg(long)]
    scm_base_url: Option<String>,

    /// API token (defaults to GH_TOKEN, or GITLAB_TOKEN for GitLab)
    #[arg(long)]
    token: Option<String>,

    /// Repositories analyzed at the same time
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Skip forked and archived repositories
    #[arg(long)]
    ignore_forks: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Format {
    Text,
    Json,
    Yaml,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScmArg {
    Github,
    Gitlab,
}

impl From<ScmArg> for ScmKind {
    fn from(arg: ScmArg) -> Self {
        match arg {
            ScmArg::Github => ScmKind::GitHub,
            ScmArg::Gitlab => ScmKind::GitLab,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory on disk
    Local {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Clone and scan a single repository
    Repo {
        /// Repository as owner/name (or group/subgroup/name on GitLab)
        name: String,

        /// Branch or tag to scan (default branch if not specified)
        #[arg(long = "ref")]
        git_ref: Option<String>,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Clone and scan every repository of an organization or group
    Org {
        /// Organization or group name
        org: String,

        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let result = match &cli.command {
        Commands::Local { path } => cmd_local(&cli, path, cancel.clone()).await,
        Commands::Repo { name, git_ref, remote } => {
            cmd_repo(&cli, name, git_ref.as_deref(), remote, cancel.clone()).await
        }
        Commands::Org { org, remote } => cmd_org(&cli, org, remote, cancel.clone()).await,
    };

    if cancel.is_cancelled() {
        let removed = analyze::cleanup_temp_dirs();
        info!(removed, "removed temporary checkouts");
    }

    let report = result?;
    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Yaml => print!("{}", serde_yaml::to_string(&report)?),
        Format::Text => display::print_report(&report),
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// First Ctrl-C cancels the run; a second one exits immediately.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupted, cancelling (press Ctrl-C again to exit immediately)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            analyze::cleanup_temp_dirs();
            std::process::exit(130);
        }
    });
}

fn load_config(cli: &Cli, scan_dir: &Path) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Config::discover(scan_dir),
    }
}

fn apply_remote_args(config: &mut Config, remote: &RemoteArgs) -> Option<String> {
    if let Some(scm) = remote.scm {
        config.scm = scm.into();
    }
    if let Some(url) = &remote.scm_base_url {
        config.scm_base_url = Some(url.clone());
    }
    if let Some(n) = remote.max_concurrency {
        config.max_concurrency = n.max(1);
    }
    if remote.ignore_forks {
        config.ignore_forks = true;
    }

    resolve_token(remote.token.as_deref(), config.scm, |var| std::env::var(var).ok())
}

/// An explicit `--token` wins over the provider's environment variable.
fn resolve_token(flag: Option<&str>, scm: ScmKind, env: impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(token) = flag {
        return Some(token.to_string());
    }
    let var = match scm {
        ScmKind::GitHub => "GH_TOKEN",
        ScmKind::GitLab => "GITLAB_TOKEN",
    };
    env(var).filter(|token| !token.is_empty())
}

fn build_inventory(config: &Config) -> Result<Arc<Inventory>> {
    let reputation: Option<Arc<dyn ReputationClient>> = match &config.reputation_url {
        Some(url) => Some(Arc::new(
            HttpReputationClient::new(url).context("Failed to build reputation client")?,
        )),
        None => None,
    };
    Ok(Arc::new(Inventory::new(
        Arc::new(BuiltinEngine::new()),
        reputation,
        config.clone(),
    )))
}

fn remote_analyzer(config: Config, token: Option<String>, cancel: CancellationToken) -> Result<Analyzer> {
    let scm = ScmClient::from_config(&config, token).context("Failed to set up SCM client")?;
    let inventory = build_inventory(&config)?;
    Ok(Analyzer::new(Arc::new(scm), Arc::new(GitCli::default()), inventory, config).with_cancellation(cancel))
}

async fn cmd_local(cli: &Cli, path: &Path, cancel: CancellationToken) -> Result<AnalysisReport> {
    if !path.is_dir() {
        anyhow::bail!("'{}' is not a directory", path.display());
    }
    let config = load_config(cli, path)?;
    let inventory = build_inventory(&config)?;
    let analyzer = Analyzer::new(
        Arc::new(ScmClient::Local(LocalProvider)),
        Arc::new(GitCli::default()),
        inventory,
        config,
    )
    .with_cancellation(cancel);

    analyzer
        .analyze_local(path)
        .await
        .with_context(|| format!("Failed to scan {}", path.display()))
}

async fn cmd_repo(
    cli: &Cli,
    name: &str,
    git_ref: Option<&str>,
    remote: &RemoteArgs,
    cancel: CancellationToken,
) -> Result<AnalysisReport> {
    let mut config = load_config(cli, Path::new("."))?;
    let token = apply_remote_args(&mut config, remote);
    let analyzer = remote_analyzer(config, token, cancel)?;

    analyzer
        .analyze_repo(name, git_ref)
        .await
        .with_context(|| format!("Failed to analyze repository {}", name))
}

async fn cmd_org(cli: &Cli, org: &str, remote: &RemoteArgs, cancel: CancellationToken) -> Result<AnalysisReport> {
    let mut config = load_config(cli, Path::new("."))?;
    let token = apply_remote_args(&mut config, remote);
    let analyzer = remote_analyzer(config, token, cancel)?;

    let report = analyzer
        .analyze_org(org)
        .await
        .with_context(|| format!("Failed to analyze organization {}", org))?;
    if report.skipped > 0 {
        warn!(skipped = report.skipped, "some repositories could not be analyzed");
    }
    Ok(report)
}
