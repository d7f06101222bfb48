//! Platform detection from remote URLs

use crate::error::{Error, Result};
use crate::types::{Platform, PlatformConfig};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// `user@host:path` scp-like syntax
static SCP_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[^@/]+@)?(?P<host>[^:/]+):(?P<path>.+)$").expect("valid regex")
});

/// Self-hosted instances identified by host name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostOverrides {
    /// GitHub Enterprise host (`GH_HOST`)
    pub github: Option<String>,
    /// Self-hosted GitLab host (`GITLAB_HOST`)
    pub gitlab: Option<String>,
}

impl HostOverrides {
    /// Read `GH_HOST` and `GITLAB_HOST`.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            github: read("GH_HOST"),
            gitlab: read("GITLAB_HOST"),
        }
    }
}

/// Split a remote URL into host and repository path.
fn split_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    if url.contains("://") {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_string();
        return Some((host, parsed.path().to_string()));
    }
    let caps = SCP_LIKE.captures(url)?;
    Some((caps["host"].to_string(), caps["path"].to_string()))
}

fn platform_for_host(host: &str, hosts: &HostOverrides) -> Option<Platform> {
    let host = host.to_ascii_lowercase();
    let is = |other: &Option<String>| {
        other
            .as_deref()
            .is_some_and(|o| o.eq_ignore_ascii_case(&host))
    };

    if host == "github.com" || is(&hosts.github) {
        Some(Platform::GitHub)
    } else if host == "gitlab.com" || is(&hosts.gitlab) {
        Some(Platform::GitLab)
    } else if host.contains("github") {
        Some(Platform::GitHub)
    } else if host.contains("gitlab") {
        Some(Platform::GitLab)
    } else {
        None
    }
}

/// Which hosting platform a remote URL points at, if supported.
pub fn detect_platform(url: &str, hosts: &HostOverrides) -> Option<Platform> {
    let (host, _) = split_remote(url)?;
    platform_for_host(&host, hosts)
}

/// Parse a remote URL into platform, owner, repository, and host.
///
/// GitLab owners may be nested group paths (`group/subgroup`).
pub fn parse_repo_info(url: &str, hosts: &HostOverrides) -> Result<PlatformConfig> {
    let (host, path) = split_remote(url).ok_or(Error::NoSupportedRemotes)?;
    let platform = platform_for_host(&host, hosts).ok_or(Error::NoSupportedRemotes)?;

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path).trim_end_matches('/');
    let (owner, repo) = path.rsplit_once('/').ok_or(Error::NoSupportedRemotes)?;
    if owner.is_empty() || repo.is_empty() {
        return Err(Error::NoSupportedRemotes);
    }

    let default_host = match platform {
        Platform::GitHub => "github.com",
        Platform::GitLab => "gitlab.com",
    };
    let host = (!host.eq_ignore_ascii_case(default_host)).then_some(host);

    Ok(PlatformConfig {
        platform,
        owner: owner.to_string(),
        repo: repo.to_string(),
        host,
    })
}
