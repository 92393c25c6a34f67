//! Manifest parsers. Each parser pairs a repository-relative path predicate
//! with a decoder that turns matching YAML into typed documents on the
//! package record.

pub mod azure;
pub mod github;
pub mod gitlab;
pub mod node;
pub mod shape;
pub mod tekton;

use crate::error::ScanError;
use crate::models::PackageInsights;
use std::path::Path;
use tracing::debug;

pub use azure::AzurePipelinesParser;
pub use github::{GitHubActionMetadataParser, GitHubActionsParser};
pub use gitlab::GitLabCIParser;
pub use tekton::TektonParser;

/// A parser invoked for every walked file whose path it matches.
pub trait ManifestParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// `rel_path` uses `/` separators and has no leading slash.
    fn matches(&self, rel_path: &str) -> bool;

    /// Decode `file` into `package`. Decode failures are logged, never returned.
    fn parse(&self, file: &Path, root: &Path, package: &mut PackageInsights) -> Result<(), ScanError>;
}

/// A parser invoked once per scan with the repository root, for formats that
/// start from a fixed file and follow references from there.
pub trait RootParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse_root(&self, root: &Path, package: &mut PackageInsights) -> Result<(), ScanError>;
}

/// The per-file parsers for every supported format.
pub fn default_parsers() -> Vec<Box<dyn ManifestParser>> {
    vec![
        Box::new(GitHubActionsParser),
        Box::new(GitHubActionMetadataParser),
        Box::new(AzurePipelinesParser),
        Box::new(TektonParser),
    ]
}

pub fn default_root_parsers() -> Vec<Box<dyn RootParser>> {
    vec![Box::new(GitLabCIParser)]
}

/// Read a manifest. A file that vanished is skipped; any other I/O failure is an error.
pub(crate) fn read_source(file: &Path) -> Result<Option<String>, ScanError> {
    match std::fs::read(file) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %file.display(), "manifest disappeared before it was read");
            Ok(None)
        }
        Err(source) => Err(ScanError::Io {
            path: file.display().to_string(),
            source,
        }),
    }
}

/// `file` relative to `root`, with `/` separators.
pub(crate) fn relative_path(file: &Path, root: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = PathBuf::from("/tmp/repo");
        let file = root.join(".github").join("workflows").join("ci.yml");
        assert_eq!(relative_path(&file, &root), ".github/workflows/ci.yml");
    }

    #[test]
    fn test_read_source_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_source(&dir.path().join("gone.yml")).unwrap().is_none());
    }

    #[test]
    fn test_read_source_fails_on_other_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_source(dir.path()).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
    }

    #[test]
    fn test_every_format_has_a_parser() {
        let parsers = default_parsers();
        let matching = |path: &str| {
            parsers
                .iter()
                .filter(|p| p.matches(path))
                .map(|p| p.name())
                .collect::<Vec<_>>()
        };
        assert_eq!(matching(".github/workflows/ci.yml"), vec!["github-actions-workflow"]);
        assert_eq!(matching("action.yaml"), vec!["github-action-metadata"]);
        assert_eq!(matching("azure-pipelines.yml"), vec!["azure-pipelines"]);
        assert_eq!(matching(".tekton/push.yaml"), vec!["tekton"]);
        assert!(matching("README.md").is_empty());
        assert_eq!(default_root_parsers()[0].name(), "gitlab-ci");
    }
}
