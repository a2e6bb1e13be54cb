//! Configuration management for cfgsync.

use std::fs;
use std::path::{Path, PathBuf};

use cfgsync_git::Identity;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the configuration, inside the repository's `.git` directory.
pub const CONFIG_FILE: &str = "cfgsync.toml";

/// cfgsync configuration loaded from `.git/cfgsync.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Upstream remote settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Commit authoring settings.
    #[serde(default)]
    pub commit: CommitConfig,
}

impl Config {
    /// Path of the configuration file for the repository at `workdir`.
    #[must_use]
    pub fn path_for(workdir: impl AsRef<Path>) -> PathBuf {
        workdir.as_ref().join(".git").join(CONFIG_FILE)
    }

    /// Load config from a TOML file.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a TOML file.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Identity used for commits when git config has none.
    #[must_use]
    pub fn identity(&self) -> Identity {
        let fallback = Identity::default();
        Identity {
            name: self.commit.author_name.clone().unwrap_or(fallback.name),
            email: self.commit.author_email.clone().unwrap_or(fallback.email),
        }
    }
}

/// Which remote and branch to synchronize with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Remote name.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch on the remote.
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            branch: default_branch(),
        }
    }
}

fn default_remote() -> String {
    "origin".into()
}

fn default_branch() -> String {
    "master".into()
}

/// Commit authoring settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitConfig {
    /// Author name, used when git config has no `user.name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    /// Author email, used when git config has no `user.email`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,

    /// Prefix put in front of every commit message.
    #[serde(default = "default_message_prefix")]
    pub message_prefix: String,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            author_name: None,
            author_email: None,
            message_prefix: default_message_prefix(),
        }
    }
}

fn default_message_prefix() -> String {
    "cfgsync: ".into()
}
