//! Package-URL identities for everything a pipeline pulls in: actions,
//! container images, CI includes, tasks and source repositories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const TYPE_GITHUB_ACTIONS: &str = "githubactions";
pub const TYPE_GITHUB: &str = "github";
pub const TYPE_GITLAB: &str = "gitlab";
pub const TYPE_GITLAB_CI: &str = "gitlabci";
pub const TYPE_AZURE_TASK: &str = "azurepipelinestask";
pub const TYPE_TEKTON: &str = "tekton";
pub const TYPE_DOCKER: &str = "docker";
pub const TYPE_GENERIC: &str = "generic";

const DOCKER_HUB_HOSTS: &[&str] = &["docker.io", "index.docker.io", "registry-1.docker.io"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurlError {
    #[error("malformed package identity '{input}': {reason}")]
    MalformedIdentity { input: String, reason: &'static str },
}

fn malformed(input: &str, reason: &'static str) -> PurlError {
    PurlError::MalformedIdentity {
        input: input.to_string(),
        reason,
    }
}

/// A package identity: `pkg:type/namespace/name@version?qualifiers#subpath`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Purl {
    pub purl_type: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub subpath: String,
    pub qualifiers: BTreeMap<String, String>,
}

impl Purl {
    pub fn new(purl_type: &str, namespace: &str, name: &str, version: &str) -> Self {
        Self {
            purl_type: purl_type.to_lowercase(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    pub fn with_qualifier(mut self, key: &str, value: &str) -> Self {
        self.qualifiers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_subpath(mut self, subpath: &str) -> Self {
        self.subpath = subpath.trim_matches('/').to_string();
        self
    }

    /// Append `path` below the existing subpath.
    pub fn join_subpath(mut self, path: &str) -> Self {
        let path = path.trim_matches('/');
        if !path.is_empty() {
            self.subpath = if self.subpath.is_empty() {
                path.to_string()
            } else {
                format!("{}/{}", self.subpath, path)
            };
        }
        self
    }

    /// `namespace/name`, or just the name when there is no namespace.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    /// Canonical form for the identity's ecosystem. Idempotent.
    pub fn normalize(&mut self) {
        self.purl_type = self.purl_type.to_lowercase();
        self.version = self.version.trim().to_string();
        self.subpath = self.subpath.trim_matches('/').to_string();
        self.qualifiers = std::mem::take(&mut self.qualifiers)
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        match self.purl_type.as_str() {
            TYPE_GITHUB | TYPE_GITHUB_ACTIONS => {
                self.namespace = self.namespace.to_lowercase();
                let name = self.name.trim_matches('/').to_string();
                let mut segments = name.splitn(2, '/');
                self.name = segments.next().unwrap_or_default().to_lowercase();
                if let Some(extra) = segments.next() {
                    self.subpath = if self.subpath.is_empty() {
                        extra.to_string()
                    } else {
                        format!("{}/{}", extra, self.subpath)
                    };
                }
            }
            TYPE_GITLAB | TYPE_DOCKER => {
                self.namespace = self.namespace.to_lowercase();
                self.name = self.name.to_lowercase();
            }
            _ => {}
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Web page for the package, or an empty string when the ecosystem has none.
    pub fn link(&self) -> String {
        match self.purl_type.as_str() {
            TYPE_GITHUB | TYPE_GITHUB_ACTIONS => {
                format!("https://github.com/{}", self.full_name())
            }
            TYPE_GITLAB => {
                let host = self
                    .qualifiers
                    .get("repository_url")
                    .map(String::as_str)
                    .unwrap_or("gitlab.com");
                format!("https://{}/{}", host, self.full_name())
            }
            TYPE_DOCKER if !self.qualifiers.contains_key("repository_url") => {
                if self.namespace.is_empty() {
                    format!("https://hub.docker.com/_/{}", self.name)
                } else {
                    format!("https://hub.docker.com/r/{}", self.full_name())
                }
            }
            _ => String::new(),
        }
    }

    /// Identity of a container image reference such as `ghcr.io/org/app:1.2@sha256:…`.
    pub fn from_docker_image(image: &str) -> Result<Self, PurlError> {
        let image = image.trim();
        if image.is_empty() {
            return Err(malformed(image, "empty image reference"));
        }
        if image.contains('$') {
            return Err(malformed(image, "image reference contains a variable"));
        }

        let (reference, digest) = match image.split_once('@') {
            Some((reference, digest)) => (reference, Some(digest)),
            None => (image, None),
        };
        let last_slash = reference.rfind('/');
        let (path, tag) = match reference.rfind(':') {
            Some(i) if last_slash.map_or(true, |s| i > s) => (&reference[..i], Some(&reference[i + 1..])),
            _ => (reference, None),
        };

        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let registry = if segments.len() > 1 && is_registry_host(segments[0]) {
            Some(segments.remove(0))
        } else {
            None
        };
        let registry = registry.filter(|host| !DOCKER_HUB_HOSTS.contains(host));

        let name = segments
            .pop()
            .ok_or_else(|| malformed(image, "image reference has no name"))?;
        if registry.is_none() && segments == ["library"] {
            segments.clear();
        }

        let version = digest.or(tag).unwrap_or_default();
        let mut purl = Purl::new(TYPE_DOCKER, &segments.join("/"), name, version);
        if let Some(host) = registry {
            purl = purl.with_qualifier("repository_url", host);
        }
        Ok(purl.normalized())
    }

    /// Identity of a GitHub Actions `uses:` reference (`owner/repo[/path]@ref` or `docker://image`).
    pub fn from_github_action(uses: &str) -> Result<Self, PurlError> {
        let uses = uses.trim();
        if uses.starts_with("./") || uses.starts_with("../") || uses == "." {
            return Err(malformed(uses, "local action reference"));
        }
        if let Some(image) = uses.strip_prefix("docker://") {
            return Self::from_docker_image(image);
        }

        let (path, version) = uses
            .split_once('@')
            .ok_or_else(|| malformed(uses, "action reference has no version"))?;
        let (owner, rest) = path
            .split_once('/')
            .ok_or_else(|| malformed(uses, "action reference has no repository"))?;
        if owner.is_empty() || rest.trim_matches('/').is_empty() || version.trim().is_empty() {
            return Err(malformed(uses, "incomplete action reference"));
        }

        Ok(Purl::new(TYPE_GITHUB_ACTIONS, owner, rest, version).normalized())
    }

    /// Identity of a GitHub repository (`owner/repo`).
    pub fn from_github_repo(full_name: &str, version: &str) -> Result<Self, PurlError> {
        let (owner, repo) = full_name
            .split_once('/')
            .ok_or_else(|| malformed(full_name, "repository name has no owner"))?;
        Ok(Purl::new(TYPE_GITHUB, owner, repo, version).normalized())
    }

    /// Identity of a GitLab project (`group/subgroup/project`).
    pub fn from_gitlab_project(path: &str, version: &str) -> Result<Self, PurlError> {
        let path = path.trim_matches('/');
        let (namespace, name) = path
            .rsplit_once('/')
            .ok_or_else(|| malformed(path, "project path has no group"))?;
        Ok(Purl::new(TYPE_GITLAB, namespace, name, version).normalized())
    }

    /// Identity of an Azure Pipelines task reference (`Name@version`).
    pub fn from_azure_task(task: &str) -> Result<Self, PurlError> {
        let task = task.trim();
        let (name, version) = task.split_once('@').unwrap_or((task, ""));
        if name.is_empty() {
            return Err(malformed(task, "empty task name"));
        }
        Ok(Purl::new(TYPE_AZURE_TASK, "", name, version).normalized())
    }

    /// Identity of a Tekton task or pipeline resolved from a hub or bundle.
    pub fn from_tekton(kind: &str, name: &str, version: &str) -> Result<Self, PurlError> {
        if name.trim().is_empty() {
            return Err(malformed(name, "empty tekton reference"));
        }
        Ok(Purl::new(TYPE_TEKTON, &kind.to_lowercase(), name.trim(), version).normalized())
    }
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

impl FromStr for Purl {
    type Err = PurlError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let rest = input
            .trim()
            .strip_prefix("pkg:")
            .ok_or_else(|| malformed(input, "missing 'pkg:' scheme"))?
            .trim_start_matches('/');

        // Subpath and qualifiers are accepted in either order.
        let (main, qualifiers, subpath) = match (rest.find('#'), rest.find('?')) {
            (Some(h), Some(q)) if h < q => (&rest[..h], &rest[q + 1..], &rest[h + 1..q]),
            (Some(h), Some(q)) => (&rest[..q], &rest[q + 1..h], &rest[h + 1..]),
            (Some(h), None) => (&rest[..h], "", &rest[h + 1..]),
            (None, Some(q)) => (&rest[..q], &rest[q + 1..], ""),
            (None, None) => (rest, "", ""),
        };

        let (purl_type, path) = main
            .split_once('/')
            .ok_or_else(|| malformed(input, "missing package name"))?;
        if purl_type.is_empty()
            || !purl_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'))
        {
            return Err(malformed(input, "invalid package type"));
        }

        let (path, version) = match path.rfind('@') {
            Some(i) => (&path[..i], decode(&path[i + 1..])),
            None => (path, String::new()),
        };
        let mut segments: Vec<String> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode)
            .collect();
        let name = segments
            .pop()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| malformed(input, "missing package name"))?;

        let mut parsed = Purl {
            purl_type: purl_type.to_lowercase(),
            namespace: segments.join("/"),
            name,
            version,
            subpath: decode(subpath.trim_matches('/')),
            qualifiers: BTreeMap::new(),
        };
        for pair in qualifiers.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| malformed(input, "qualifier without value"))?;
            parsed.qualifiers.insert(key.to_lowercase(), decode(value));
        }
        Ok(parsed)
    }
}

impl fmt::Display for Purl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkg:{}/", self.purl_type)?;
        for segment in self.namespace.split('/').filter(|s| !s.is_empty()) {
            write!(f, "{}/", encode(segment))?;
        }
        write!(f, "{}", encode(&self.name))?;
        if !self.version.is_empty() {
            write!(f, "@{}", encode(&self.version))?;
        }
        let qualifiers: Vec<String> = self
            .qualifiers
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{}={}", k, encode(v)))
            .collect();
        if !qualifiers.is_empty() {
            write!(f, "?{}", qualifiers.join("&"))?;
        }
        if !self.subpath.is_empty() {
            let subpath: Vec<String> = self.subpath.split('/').map(encode).collect();
            write!(f, "#{}", subpath.join("/"))?;
        }
        Ok(())
    }
}

impl From<Purl> for String {
    fn from(purl: Purl) -> Self {
        purl.to_string()
    }
}

impl TryFrom<String> for Purl {
    type Error = PurlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn encode(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' | '@' | '?' | '#' | '&' | '=' | '/' | ' ' | '+' => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn decode(component: &str) -> String {
    let bytes = component.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_and_prints_full_identity() {
        let raw = "pkg:githubactions/actions/checkout@v4?repository_url=github.com#sub/dir";
        let purl: Purl = raw.parse().unwrap();
        assert_eq!(purl.purl_type, "githubactions");
        assert_eq!(purl.namespace, "actions");
        assert_eq!(purl.name, "checkout");
        assert_eq!(purl.version, "v4");
        assert_eq!(purl.subpath, "sub/dir");
        assert_eq!(purl.qualifiers["repository_url"], "github.com");
        assert_eq!(purl.to_string(), raw);
    }

    #[test]
    fn test_accepts_subpath_before_qualifiers() {
        let purl: Purl = "pkg:github/owner/repo@main#path?a=b".parse().unwrap();
        assert_eq!(purl.subpath, "path");
        assert_eq!(purl.qualifiers["a"], "b");
    }

    #[test]
    fn test_rejects_malformed_identities() {
        assert!("github/owner/repo".parse::<Purl>().is_err());
        assert!("pkg:git hub/owner/repo".parse::<Purl>().is_err());
        assert!("pkg:docker".parse::<Purl>().is_err());
        assert!("pkg:docker/a?b".parse::<Purl>().is_err());
    }

    #[test]
    fn test_normalize_folds_case_and_moves_extra_segments() {
        let purl = Purl::new(TYPE_GITHUB_ACTIONS, "Owner", "Repo/Sub/Action", "v1").normalized();
        assert_eq!(purl.full_name(), "owner/repo");
        assert_eq!(purl.subpath, "Sub/Action");
        assert_eq!(purl.to_string(), "pkg:githubactions/owner/repo@v1#Sub/Action");
    }

    #[test]
    fn test_normalize_keeps_case_for_case_sensitive_ecosystems() {
        let purl = Purl::new(TYPE_AZURE_TASK, "", "PowerShell", "2").normalized();
        assert_eq!(purl.name, "PowerShell");
        let purl = Purl::new(TYPE_GITLAB_CI, "template", "Auto-DevOps.gitlab-ci.yml", "").normalized();
        assert_eq!(purl.name, "Auto-DevOps.gitlab-ci.yml");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "pkg:githubactions/Actions/Checkout@ v4 #x",
            "pkg:github/Org/Repo/extra/segments@main",
            "pkg:docker/Library/Ubuntu@22.04?Repository_Url=quay.io",
            "pkg:gitlab/Group/Sub/Project@main",
            "pkg:gitlabci/remote/ci.yml?download_url=https%3A%2F%2Fexample.com%2Fci.yml",
            "pkg:azurepipelinestask/Bash@3",
            "pkg:tekton/task/git-clone@0.9",
        ];
        for raw in samples {
            let once = raw.parse::<Purl>().unwrap().normalized();
            let twice = once.clone().normalized();
            assert_eq!(once, twice, "{raw}");
            let reparsed: Purl = once.to_string().parse().unwrap();
            assert_eq!(reparsed, once, "{raw}");
        }
    }

    #[test]
    fn test_docker_image_identities() {
        let purl = Purl::from_docker_image("node:20-slim").unwrap();
        assert_eq!(purl.to_string(), "pkg:docker/node@20-slim");
        assert_eq!(purl.link(), "https://hub.docker.com/_/node");

        let purl = Purl::from_docker_image("docker.io/library/ubuntu:22.04").unwrap();
        assert_eq!(purl.to_string(), "pkg:docker/ubuntu@22.04");

        let purl = Purl::from_docker_image("ghcr.io/Org/App:1.2@sha256:abc").unwrap();
        assert_eq!(purl.namespace, "org");
        assert_eq!(purl.version, "sha256:abc");
        assert_eq!(purl.qualifiers["repository_url"], "ghcr.io");
        assert_eq!(purl.link(), "");

        let purl = Purl::from_docker_image("localhost:5000/tools/lint").unwrap();
        assert_eq!(purl.qualifiers["repository_url"], "localhost:5000");
        assert_eq!(purl.version, "");

        assert!(Purl::from_docker_image("$CI_REGISTRY_IMAGE:latest").is_err());
    }

    #[test]
    fn test_github_action_identities() {
        let purl = Purl::from_github_action("actions/checkout@v4").unwrap();
        assert_eq!(purl.to_string(), "pkg:githubactions/actions/checkout@v4");
        assert_eq!(purl.link(), "https://github.com/actions/checkout");

        let purl =
            Purl::from_github_action("octo-org/Workflows/.github/workflows/ci.yml@main").unwrap();
        assert_eq!(purl.full_name(), "octo-org/workflows");
        assert_eq!(purl.subpath, ".github/workflows/ci.yml");

        let purl = Purl::from_github_action("docker://alpine:3.19").unwrap();
        assert_eq!(purl.to_string(), "pkg:docker/alpine@3.19");

        assert!(Purl::from_github_action("./.github/actions/local").is_err());
        assert!(Purl::from_github_action("actions/checkout").is_err());
        assert!(Purl::from_github_action("checkout@v4").is_err());
    }

    #[test]
    fn test_links_for_ecosystems_without_web_presence_are_empty() {
        assert_eq!(Purl::from_azure_task("Bash@3").unwrap().link(), "");
        assert_eq!(Purl::from_tekton("Task", "git-clone", "0.9").unwrap().link(), "");
        assert_eq!(
            Purl::from_gitlab_project("Group/Project", "main").unwrap().link(),
            "https://gitlab.com/group/project"
        );
    }

    #[test]
    fn test_encodes_reserved_characters() {
        let purl = Purl::new(TYPE_GITLAB_CI, "remote", "ci.yml", "")
            .with_qualifier("download_url", "https://example.com/ci.yml?x=1");
        let printed = purl.to_string();
        assert!(printed.contains("download_url=https:%2F%2Fexample.com%2Fci.yml%3Fx%3D1"));
        assert_eq!(printed.parse::<Purl>().unwrap(), purl);
    }
}
