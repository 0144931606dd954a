//! `git` subprocess adapter
//!
//! Each step is one `git` invocation; the first failing step aborts the
//! sequence and is reported with its [`GitStep`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use super::{GitConfig, GitStep, VersionControl, VersionControlError};

const ORIGIN: &str = "origin";

/// Working tree mirrored to a remote through the `git` binary
#[derive(Debug, Clone)]
pub struct GitRepository {
    config: GitConfig,
}

impl GitRepository {
    pub fn new(config: GitConfig) -> Self {
        Self { config }
    }

    /// Run `git <args>` in `dir`, returning stdout on success
    async fn git_in(
        &self,
        step: GitStep,
        dir: &Path,
        args: &[&str],
    ) -> Result<String, VersionControlError> {
        debug!(%step, "git {}", args.join(" "));

        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());

        if let Some(identity) = &self.config.identity {
            cmd.env("GIT_AUTHOR_NAME", &identity.name)
                .env("GIT_AUTHOR_EMAIL", &identity.email)
                .env("GIT_COMMITTER_NAME", &identity.name)
                .env("GIT_COMMITTER_EMAIL", &identity.email);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| VersionControlError::new(step, format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            };
            return Err(VersionControlError::new(step, reason));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn git(&self, step: GitStep, args: &[&str]) -> Result<String, VersionControlError> {
        self.git_in(step, &self.config.work_tree, args).await
    }

    /// Point `origin` at the configured remote, adding it if missing
    async fn ensure_remote(&self, remote: &str) -> Result<(), VersionControlError> {
        let remotes = self.git(GitStep::Remote, &["remote"]).await?;

        if remotes.lines().any(|r| r.trim() == ORIGIN) {
            self.git(GitStep::Remote, &["remote", "set-url", ORIGIN, remote])
                .await?;
        } else {
            self.git(GitStep::Remote, &["remote", "add", ORIGIN, remote])
                .await?;
        }
        Ok(())
    }

    /// Discard local drift, then pull the published branch
    async fn sync(&self) -> Result<(), VersionControlError> {
        let branch = self.config.branch.as_str();
        self.git(GitStep::Reset, &["reset", "--hard", "HEAD"])
            .await?;
        self.git(GitStep::Pull, &["pull", "--rebase", ORIGIN, branch])
            .await?;
        Ok(())
    }

    async fn has_staged_changes(&self) -> Result<bool, VersionControlError> {
        let staged = self
            .git(GitStep::Status, &["diff", "--cached", "--name-only"])
            .await?;
        Ok(!staged.trim().is_empty())
    }

    async fn clone_remote(&self, remote: &str) -> Result<(), VersionControlError> {
        let work_tree = &self.config.work_tree;
        let target = work_tree
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                VersionControlError::new(
                    GitStep::Clone,
                    format!("invalid working tree path {}", work_tree.display()),
                )
            })?;
        let parent = match work_tree.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        match fs::remove_dir_all(work_tree).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(VersionControlError::new(
                    GitStep::Clone,
                    format!("failed to remove {}: {}", work_tree.display(), e),
                ));
            }
        }
        fs::create_dir_all(&parent).await.map_err(|e| {
            VersionControlError::new(
                GitStep::Clone,
                format!("failed to create {}: {}", parent.display(), e),
            )
        })?;

        self.git_in(GitStep::Clone, &parent, &["clone", remote, target])
            .await?;
        Ok(())
    }

    async fn init_local(&self) -> Result<(), VersionControlError> {
        let work_tree = &self.config.work_tree;
        fs::create_dir_all(work_tree).await.map_err(|e| {
            VersionControlError::new(
                GitStep::Init,
                format!("failed to create {}: {}", work_tree.display(), e),
            )
        })?;

        self.git(GitStep::Init, &["init"]).await?;
        let head = format!("refs/heads/{}", self.config.branch);
        self.git(GitStep::Branch, &["symbolic-ref", "HEAD", head.as_str()])
            .await?;

        self.git(GitStep::Add, &["add", "."]).await?;
        if self.has_staged_changes().await? {
            self.git(GitStep::Commit, &["commit", "-m", "Initial commit"])
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VersionControl for GitRepository {
    async fn ensure_initialized(&self) -> Result<(), VersionControlError> {
        let work_tree = &self.config.work_tree;

        if fs::metadata(work_tree.join(".git")).await.is_ok() {
            if let Some(remote) = &self.config.remote {
                self.ensure_remote(remote).await?;
                self.sync().await?;
            }
            info!("Using existing git working tree at {}", work_tree.display());
            return Ok(());
        }

        if let Some(remote) = &self.config.remote {
            self.clone_remote(remote).await?;
            info!("Cloned {} into {}", remote, work_tree.display());
            return Ok(());
        }

        self.init_local().await?;
        info!("Initialized new git history at {}", work_tree.display());
        Ok(())
    }

    async fn publish(&self, paths: &[String], message: &str) -> Result<(), VersionControlError> {
        let mut args = vec!["add", "-A", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git(GitStep::Add, &args).await?;

        if !self.has_staged_changes().await? {
            debug!("Nothing staged for '{}', skipping commit", message);
            return Ok(());
        }

        self.git(GitStep::Commit, &["commit", "-m", message])
            .await?;

        if self.config.remote.is_some() {
            let branch = self.config.branch.as_str();
            self.sync().await?;
            self.git(GitStep::Push, &["push", ORIGIN, branch]).await?;
        }

        info!("Published: {}", message);
        Ok(())
    }
}
