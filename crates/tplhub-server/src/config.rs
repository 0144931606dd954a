//! Server configuration management
//!
//! Resolved once at startup: the persisted file (created with defaults when
//! missing), then environment overrides. Immutable afterwards.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tplhub::{CommitIdentity, GitConfig, StoreConfig};
use tracing::info;

use crate::auth::{Permission, default_keys};
use crate::error::{ApiError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_GIT_REMOTE: &str = "git@github.com:rejigtian/codeTemplateFiles.git";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Remote repository address; empty keeps the history local
    pub git_remote: String,

    /// Port to bind to
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Git working tree holding the category directories and the index
    pub data_dir: PathBuf,

    /// Index file name inside `data_dir`
    pub index_file: String,

    /// Accepted upload extension, including the dot
    pub allowed_extension: String,

    /// Branch that is pulled and pushed
    pub git_branch: String,

    /// Identity for generated commits; git's own config applies when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_email: Option<String>,

    /// API key to granted capabilities
    pub api_keys: HashMap<String, Vec<Permission>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            git_remote: DEFAULT_GIT_REMOTE.to_string(),
            port: 8080,
            host: "0.0.0.0".to_string(),
            data_dir: PathBuf::from("templates"),
            index_file: "metadata.json".to_string(),
            allowed_extension: ".zip".to_string(),
            git_branch: "main".to_string(),
            commit_name: None,
            commit_email: None,
            api_keys: default_keys(),
        }
    }
}

impl ServerConfig {
    /// Load from the file named by `TPLHUB_CONFIG` (or `config.json`) and the
    /// process environment
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("TPLHUB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::load_or_init(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read the config file, writing the defaults back when it does not exist
    pub fn load_or_init(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let config = Self::default();
                config.save(path)?;
                info!("Wrote default configuration to {}", path.display());
                Ok(config)
            }
            Err(e) => Err(ApiError::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Apply `GIT_REMOTE`, `SERVER_PORT` and `HOST` from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(remote) = lookup("GIT_REMOTE").filter(|r| !r.is_empty()) {
            self.git_remote = remote;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.port = port
                .parse()
                .map_err(|_| ApiError::Config("Invalid SERVER_PORT value".to_string()))?;
        }
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.data_dir)
            .with_index_file(self.index_file.clone())
            .with_allowed_extension(self.allowed_extension.clone())
    }

    pub fn git_config(&self) -> GitConfig {
        let mut git = GitConfig::new(&self.data_dir)
            .with_remote(self.git_remote.clone())
            .with_branch(self.git_branch.clone());
        if let (Some(name), Some(email)) = (&self.commit_name, &self.commit_email) {
            git = git.with_identity(CommitIdentity::new(name, email));
        }
        git
    }
}
