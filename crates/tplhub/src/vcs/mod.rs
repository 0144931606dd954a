//! Version control seam
//!
//! The coordinator only needs two primitives: bootstrap the working tree and
//! publish a set of changed paths. [`GitRepository`] implements them by
//! shelling out to `git`.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub mod git;

pub use git::GitRepository;

/// Identifies which external invocation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitStep {
    Init,
    Branch,
    Remote,
    Reset,
    Pull,
    Clone,
    Add,
    Status,
    Commit,
    Push,
}

impl fmt::Display for GitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GitStep::Init => "init",
            GitStep::Branch => "branch",
            GitStep::Remote => "remote",
            GitStep::Reset => "reset",
            GitStep::Pull => "pull",
            GitStep::Clone => "clone",
            GitStep::Add => "add",
            GitStep::Status => "status",
            GitStep::Commit => "commit",
            GitStep::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone)]
#[error("git {step} failed: {reason}")]
pub struct VersionControlError {
    pub step: GitStep,
    pub reason: String,
}

impl VersionControlError {
    pub fn new(step: GitStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

/// Author and committer used for generated commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Settings for [`GitRepository`], fixed at construction
#[derive(Debug, Clone)]
pub struct GitConfig {
    pub work_tree: PathBuf,
    /// Address of `origin`; `None` keeps the history local
    pub remote: Option<String>,
    pub branch: String,
    pub identity: Option<CommitIdentity>,
}

impl GitConfig {
    pub fn new(work_tree: impl AsRef<Path>) -> Self {
        Self {
            work_tree: work_tree.as_ref().to_path_buf(),
            remote: None,
            branch: "main".to_string(),
            identity: None,
        }
    }

    /// Set the remote address. An empty string means no remote.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        let remote = remote.into();
        self.remote = (!remote.trim().is_empty()).then_some(remote);
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_identity(mut self, identity: CommitIdentity) -> Self {
        self.identity = Some(identity);
        self
    }
}

/// Narrow interface over the version-controlled working tree
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Bring the working tree into a usable state. Safe to call repeatedly.
    async fn ensure_initialized(&self) -> Result<(), VersionControlError>;

    /// Stage `paths` (relative to the working tree), commit and push
    ///
    /// Nothing staged is not an error: the commit is skipped.
    async fn publish(&self, paths: &[String], message: &str) -> Result<(), VersionControlError>;
}

/// Adapter for deployments without history
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVersionControl;

#[async_trait]
impl VersionControl for NoVersionControl {
    async fn ensure_initialized(&self) -> Result<(), VersionControlError> {
        Ok(())
    }

    async fn publish(&self, _paths: &[String], _message: &str) -> Result<(), VersionControlError> {
        Ok(())
    }
}
