//! [`Vcs`] implementation backed by the `git` command line.

use super::{PushOptions, RebaseOutcome, Vcs};
use crate::error::{Error, Result};
use crate::types::GitRemote;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Runs `git` in a repository's working tree.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            return Err(Error::Git(format!(
                "{} is not inside a git repository",
                path.display()
            )));
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    /// Working tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(cmd = %format!("git {}", args.join(" ")), "running");
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .env("GIT_EDITOR", "true")
            .output()
            .map_err(|e| Error::Git(format!("failed to run git {}: {e}", args.join(" "))))
    }

    /// Run and return trimmed stdout, failing on non-zero exit.
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(command_error(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run a predicate command: exit 0 is true, exit 1 is false.
    fn test(&self, args: &[&str]) -> Result<bool> {
        let output = self.output(args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_error(args, &output)),
        }
    }

    /// Map a failed rebase step to a conflict if git left a rebase paused.
    fn rebase_result(&self, args: &[&str], output: &Output) -> Result<RebaseOutcome> {
        if output.status.success() && !self.rebase_in_progress()? {
            return Ok(RebaseOutcome::Completed);
        }
        if self.rebase_in_progress()? {
            let files = self.conflicted_files()?;
            debug!(?files, "rebase stopped on conflicts");
            return Ok(RebaseOutcome::Conflict(files));
        }
        Err(command_error(args, output))
    }
}

fn command_error(args: &[&str], output: &Output) -> Error {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Error::Git(format!("git {} failed: {detail}", args.join(" ")))
}

impl Vcs for GitCli {
    fn git_dir(&self) -> Result<PathBuf> {
        let dir = PathBuf::from(self.run(&["rev-parse", "--git-common-dir"])?);
        Ok(if dir.is_relative() {
            self.root.join(dir)
        } else {
            dir
        })
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let args = ["symbolic-ref", "--quiet", "--short", "HEAD"];
        let output = self.output(&args)?;
        match output.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            Some(1) => Ok(None),
            _ => Err(command_error(&args, &output)),
        }
    }

    fn branch_exists(&self, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{branch}");
        self.test(&["show-ref", "--verify", "--quiet", &refname])
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        let refname = format!("refs/remotes/{remote}/{branch}");
        self.test(&["show-ref", "--verify", "--quiet", &refname])
    }

    fn rev_parse(&self, rev: &str) -> Result<String> {
        let spec = format!("{rev}^{{commit}}");
        self.run(&["rev-parse", "--verify", "--quiet", &spec])
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        self.test(&["merge-base", "--is-ancestor", ancestor, descendant])
    }

    fn checkout(&mut self, branch: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", branch]).map(|_| ())
    }

    fn create_branch(&mut self, branch: &str, start: &str) -> Result<()> {
        self.run(&["branch", "--no-track", branch, start]).map(|_| ())
    }

    fn delete_branch(&mut self, branch: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        self.run(&["branch", flag, branch]).map(|_| ())
    }

    fn merge_branch(&mut self, branch: &str, squash: bool, message: &str) -> Result<()> {
        if !squash {
            return self.run(&["merge", "--ff-only", "--quiet", branch]).map(|_| ());
        }
        let merged = self.run(&["merge", "--squash", "--quiet", branch]);
        if let Err(e) = merged {
            // Leave the working tree as it was
            let _ = self.run(&["reset", "--merge"]);
            return Err(e);
        }
        self.run(&["commit", "--quiet", "-m", message]).map(|_| ())
    }

    fn fetch(&mut self, remote: &str) -> Result<()> {
        self.run(&["fetch", "--prune", "--quiet", remote]).map(|_| ())
    }

    fn reset_to_remote(&mut self, remote: &str, branch: &str) -> Result<()> {
        let target = format!("{remote}/{branch}");
        if self.current_branch()?.as_deref() == Some(branch) {
            self.run(&["reset", "--hard", "--quiet", &target]).map(|_| ())
        } else {
            self.run(&["branch", "--force", branch, &target]).map(|_| ())
        }
    }

    fn rebase_onto(&mut self, onto: &str, upstream: Option<&str>) -> Result<RebaseOutcome> {
        let args: Vec<&str> = match upstream {
            Some(upstream) => vec!["rebase", "--onto", onto, upstream],
            None => vec!["rebase", onto],
        };
        let output = self.output(&args)?;
        self.rebase_result(&args, &output)
    }

    fn continue_rebase(&mut self) -> Result<RebaseOutcome> {
        let args = ["rebase", "--continue"];
        let output = self.output(&args)?;
        self.rebase_result(&args, &output)
    }

    fn rebase_in_progress(&self) -> Result<bool> {
        for state_dir in ["rebase-merge", "rebase-apply"] {
            let path = PathBuf::from(self.run(&["rev-parse", "--git-path", state_dir])?);
            let path = if path.is_relative() {
                self.root.join(path)
            } else {
                path
            };
            if path.exists() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn conflicted_files(&self) -> Result<Vec<String>> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn push(&mut self, remote: &str, branch: &str, options: PushOptions) -> Result<()> {
        let mut args = vec!["push", "--quiet"];
        if options.set_upstream {
            args.push("--set-upstream");
        }
        if options.force_with_lease {
            args.push("--force-with-lease");
        }
        args.push(remote);
        args.push(branch);
        self.run(&args).map(|_| ())
    }

    fn remotes(&self) -> Result<Vec<GitRemote>> {
        let out = self.run(&["remote", "-v"])?;
        Ok(parse_remote_list(&out))
    }

    fn config_entries(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let pattern = format!("^{}", prefix.replace('.', "\\."));
        let args = ["config", "--get-regexp", pattern.as_str()];
        let output = self.output(&args)?;
        match output.status.code() {
            Some(0) => {}
            // No matching keys
            Some(1) => return Ok(Vec::new()),
            _ => return Err(command_error(&args, &output)),
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(' ').unwrap_or((line, ""));
                (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect())
    }
}

/// Parse `git remote -v` output, keeping the fetch URL of each remote.
fn parse_remote_list(output: &str) -> Vec<GitRemote> {
    let mut remotes: Vec<GitRemote> = Vec::new();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
            continue;
        };
        if parts.next() == Some("(push)") || remotes.iter().any(|r| r.name == name) {
            continue;
        }
        remotes.push(GitRemote {
            name: name.to_string(),
            url: url.to_string(),
        });
    }
    remotes
}
