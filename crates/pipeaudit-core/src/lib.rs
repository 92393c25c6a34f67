pub mod analyze;
pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod inventory;
pub mod models;
pub mod parser;
pub mod purl;
pub mod reputation;
pub mod scanner;
pub mod scm;

pub use analyze::{AnalysisReport, Analyzer};
pub use config::Config;
pub use engine::{BuiltinEngine, Finding, FindingsResult, PolicyEngine, Severity};
pub use error::{AnalyzeError, DecodeError, ScanError};
pub use git::{GitCli, GitClient};
pub use inventory::{Inventory, ProviderInfo};
pub use models::PackageInsights;
pub use purl::Purl;
pub use reputation::{HttpReputationClient, ReputationClient};
pub use scanner::InventoryScanner;
pub use scm::{ScmClient, ScmProvider};
