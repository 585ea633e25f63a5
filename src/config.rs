use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    github::get_github_token,
    types::{DEFAULT_BASE_BRANCH, Repo},
};

/// Contents of the bot's YAML config file.
///
/// ```yaml
/// working_dir: /srv/zroj_core
/// ci_tool_dir: /srv/ci_tool
/// gh_token: ghp_...
/// ```
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Clone of the swept repository that the CI tool runs in.
    pub working_dir: PathBuf,
    /// Directory holding the ci_tool crate's `Cargo.toml`.
    pub ci_tool_dir: PathBuf,
    #[serde(default)]
    pub gh_token: Option<String>,
    #[serde(default)]
    pub repo: Repo,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
}

fn default_base_branch() -> String {
    DEFAULT_BASE_BRANCH.to_string()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.base_branch.trim().is_empty() {
            anyhow::bail!("base_branch cannot be empty");
        }
        if self.working_dir.as_os_str().is_empty() {
            anyhow::bail!("working_dir cannot be empty");
        }
        if self.ci_tool_dir.as_os_str().is_empty() {
            anyhow::bail!("ci_tool_dir cannot be empty");
        }
        Ok(())
    }

    /// The configured token, or whatever the environment or `gh` provides.
    pub fn token(&self) -> Result<String> {
        match self.gh_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => get_github_token().context(
                "No gh_token in config and no GitHub credentials found in the environment",
            ),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("working_dir", &self.working_dir)
            .field("ci_tool_dir", &self.ci_tool_dir)
            .field("gh_token", &self.gh_token.as_ref().map(|_| "<redacted>"))
            .field("repo", &self.repo)
            .field("base_branch", &self.base_branch)
            .finish()
    }
}
