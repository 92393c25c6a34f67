//! Walks a repository tree and feeds every matching file to the manifest parsers.

use crate::error::ScanError;
use crate::models::PackageInsights;
use crate::parser::{self, relative_path, ManifestParser, RootParser};
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

pub struct InventoryScanner {
    parsers: Vec<Box<dyn ManifestParser>>,
    root_parsers: Vec<Box<dyn RootParser>>,
}

impl Default for InventoryScanner {
    fn default() -> Self {
        Self::new(parser::default_parsers(), parser::default_root_parsers())
    }
}

impl InventoryScanner {
    pub fn new(parsers: Vec<Box<dyn ManifestParser>>, root_parsers: Vec<Box<dyn RootParser>>) -> Self {
        Self {
            parsers,
            root_parsers,
        }
    }

    /// Scan `root` into `package`.
    ///
    /// Every file is offered to every parser whose predicate matches it. A
    /// walk error aborts the scan; per-file decode failures never do.
    pub fn run(&self, root: &Path, package: &mut PackageInsights) -> Result<(), ScanError> {
        for root_parser in &self.root_parsers {
            debug!(parser = root_parser.name(), root = %root.display(), "running root parser");
            root_parser.parse_root(root, package)?;
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|entry| !is_git_dir(entry));

        for entry in walker {
            let entry = entry.map_err(|source| ScanError::Walk {
                path: root.display().to_string(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel = relative_path(entry.path(), root);
            for parser in self.parsers.iter().filter(|p| p.matches(&rel)) {
                debug!(parser = parser.name(), path = %rel, "parsing manifest");
                parser.parse(entry.path(), root, package)?;
            }
        }

        debug!(
            root = %root.display(),
            manifests = package.manifest_count(),
            "scan finished"
        );
        Ok(())
    }
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_collects_every_format() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            ".github/workflows/ci.yml",
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - uses: actions/checkout@v4\n",
        );
        write(root, ".github/actions/setup/action.yml", "runs:\n  using: node20\n  main: index.js\n");
        write(root, ".gitlab-ci.yml", "test:\n  script: make\n");
        write(root, "azure-pipelines.yml", "steps:\n  - bash: make\n");
        write(
            root,
            ".tekton/push.yaml",
            "kind: PipelineRun\nspec:\n  pipelineRef:\n    name: build\n",
        );
        write(root, "README.md", "# nothing here\n");

        let mut package = PackageInsights::default();
        InventoryScanner::default().run(root, &mut package).unwrap();

        assert_eq!(package.github_actions_workflows.len(), 1);
        assert_eq!(package.github_actions_workflows[0].path, ".github/workflows/ci.yml");
        assert_eq!(package.github_actions_metadata.len(), 1);
        assert_eq!(package.gitlabci_configs.len(), 1);
        assert_eq!(package.azure_pipelines.len(), 1);
        assert_eq!(package.pipeline_as_code_tekton.len(), 1);
        assert_eq!(package.manifest_count(), 5);
    }

    #[test]
    fn test_scan_skips_git_dir_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, ".git/action.yml", "runs:\n  using: node20\n");
        write(root, ".github/workflows/broken.yml", "on: [push\njobs: {}\n");
        write(root, ".github/workflows/empty.yml", "name: nothing\non: push\n");
        write(root, "sub/action.yaml", "runs:\n  using: composite\n  steps: []\n");

        let mut package = PackageInsights::default();
        InventoryScanner::default().run(root, &mut package).unwrap();

        assert!(package.github_actions_workflows.is_empty());
        assert_eq!(package.github_actions_metadata.len(), 1);
        assert_eq!(package.github_actions_metadata[0].path, "sub/action.yaml");
    }

    #[test]
    fn test_scan_of_missing_root_is_a_walk_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let mut package = PackageInsights::default();
        let err = InventoryScanner::default().run(&missing, &mut package).unwrap_err();
        assert!(matches!(err, ScanError::Walk { .. }));
    }
}
