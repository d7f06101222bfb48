//! User and repository configuration
//!
//! Layers, lowest first: built-in defaults, the user file
//! (`<config-dir>/stak/config.toml`), the repository file
//! (`<git-dir>/stak/config.toml`). CLI flags are applied by the caller.

use crate::error::{Error, Result};
use crate::types::MergeMethod;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE: &str = "config.toml";

/// Effective configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Remote to use instead of `origin`
    pub remote: Option<String>,
    /// Default merge strategy
    pub merge_method: MergeMethod,
    /// Maintain the stack comment on linked review requests
    pub stack_comments: bool,
    /// Default parent for newly tracked branches
    pub trunk: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: None,
            merge_method: MergeMethod::default(),
            stack_comments: true,
            trunk: None,
        }
    }
}

/// One config file; every field optional so layers can be merged
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    remote: Option<String>,
    merge_method: Option<MergeMethod>,
    stack_comments: Option<bool>,
    trunk: Option<String>,
}

impl Config {
    /// Load user and repository layers for the repository at `git_dir`.
    pub fn load(git_dir: &Path) -> Result<Self> {
        let user = dirs::config_dir().map(|d| d.join("stak").join(CONFIG_FILE));
        let repo = repo_config_path(git_dir);
        Self::from_files(user.as_deref(), Some(&repo))
    }

    /// Merge the given files over the defaults. Missing files are skipped.
    pub fn from_files(user: Option<&Path>, repo: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        for path in [user, repo].into_iter().flatten() {
            if let Some(layer) = read_layer(path)? {
                config.apply(layer);
            }
        }
        Ok(config)
    }

    fn apply(&mut self, layer: ConfigFile) {
        if layer.remote.is_some() {
            self.remote = layer.remote;
        }
        if let Some(method) = layer.merge_method {
            self.merge_method = method;
        }
        if let Some(comments) = layer.stack_comments {
            self.stack_comments = comments;
        }
        if layer.trunk.is_some() {
            self.trunk = layer.trunk;
        }
    }
}

fn read_layer(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    debug!(path = %path.display(), "reading config");
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))
}

/// Path of the repository-level config file
pub fn repo_config_path(git_dir: &Path) -> PathBuf {
    git_dir.join("stak").join(CONFIG_FILE)
}
