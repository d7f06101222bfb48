//! Shared command context for CLI commands
//!
//! Extracts common setup code shared by every command.

use anstream::println;
use stak::config::Config;
use stak::engine::EngineContext;
use stak::error::{Error, Result};
use stak::platform::{HostOverrides, PlatformService, create_platform_service, parse_repo_info};
use stak::progress::ProgressCallback;
use stak::tracking::{FileStore, LEGACY_CONFIG_PREFIX, import_legacy_config};
use stak::types::GitRemote;
use stak::vcs::{GitCli, Vcs, select_remote};
use std::path::Path;
use tracing::debug;

use super::style::Stylize;

/// Repository-local state shared by every command
///
/// Opening it migrates legacy git-config metadata into the typed store on
/// first use.
pub struct LocalRepo {
    /// Git working copy
    pub git: GitCli,
    /// Stack metadata
    pub store: FileStore,
    /// Effective configuration
    pub config: Config,
}

impl LocalRepo {
    /// Open the repository containing `path`
    pub fn open(path: &Path) -> Result<Self> {
        let git = GitCli::open(path)?;
        let git_dir = git.git_dir()?;
        let store = FileStore::new(&git_dir);
        let config = Config::load(&git_dir)?;

        if !store.exists() {
            let entries = git.config_entries(LEGACY_CONFIG_PREFIX)?;
            if !entries.is_empty() {
                let state = import_legacy_config(&entries)?;
                store.save(&state)?;
                println!(
                    "{}",
                    format!(
                        "Imported {} tracked branch(es) from git config into {}",
                        state.branches.len(),
                        store.path().display()
                    )
                    .muted()
                );
            }
        }

        Ok(Self { git, store, config })
    }

    /// Branch named on the command line, else the checked-out one
    pub fn branch_or_current(&self, branch: Option<&str>) -> Result<String> {
        match branch {
            Some(branch) => Ok(branch.to_string()),
            None => self.git.current_branch()?.ok_or_else(|| {
                Error::Git("HEAD is detached; name a branch explicitly".to_string())
            }),
        }
    }

    /// Remote chosen by flag, then config, then `origin`
    pub fn remote(&self, flag: Option<&str>) -> Result<GitRemote> {
        let remotes = self.git.remotes()?;
        select_remote(&remotes, flag.or(self.config.remote.as_deref()))
    }
}

/// Shared context for commands that talk to the hosting platform
///
/// This struct encapsulates the common setup:
/// - Opening the repository and loading config
/// - Selecting and validating the remote
/// - Detecting the platform and creating the service
pub struct CommandContext {
    /// Local repository state
    pub repo: LocalRepo,
    /// Platform service (GitHub/GitLab)
    pub platform: Box<dyn PlatformService>,
    /// Selected remote name
    pub remote_name: String,
}

impl CommandContext {
    /// Create a new command context
    pub async fn new(path: &Path, remote: Option<&str>) -> Result<Self> {
        let repo = LocalRepo::open(path)?;
        let remote = repo.remote(remote)?;

        let platform_config = parse_repo_info(&remote.url, &HostOverrides::from_env())?;
        debug!(remote = %remote.name, platform = %platform_config.platform, "detected platform");
        let platform = create_platform_service(&platform_config).await?;

        Ok(Self {
            repo,
            platform,
            remote_name: remote.name,
        })
    }

    /// Collaborator bundle for one engine run
    pub fn engine<'a>(&'a mut self, progress: &'a dyn ProgressCallback) -> EngineContext<'a> {
        EngineContext {
            vcs: &mut self.repo.git,
            store: &mut self.repo.store,
            platform: self.platform.as_ref(),
            remote: &self.remote_name,
            progress,
        }
    }
}
