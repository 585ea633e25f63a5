use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Owner and name of the repository swept when neither the config nor the
/// CLI names one.
pub const DEFAULT_REPO_OWNER: &str = "iruioj";
pub const DEFAULT_REPO_NAME: &str = "zroj_core";

/// Branch that pull requests are compared against by default.
pub const DEFAULT_BASE_BRANCH: &str = "master";

/// Reasons a string is not a usable `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    EmptyOwner,
    EmptyName,
    InvalidFormat(String),
    InvalidUrl(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::EmptyOwner => write!(f, "repository owner cannot be empty"),
            RepoError::EmptyName => write!(f, "repository name cannot be empty"),
            RepoError::InvalidFormat(s) => {
                write!(f, "repository must be in format 'owner/repo', got: '{s}'")
            }
            RepoError::InvalidUrl(s) => {
                write!(
                    f,
                    "URL must look like https://github.com/owner/repo, got: '{s}'"
                )
            }
        }
    }
}

impl std::error::Error for RepoError {}

/// A forge repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();

        if owner.trim().is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.trim().is_empty() {
            return Err(RepoError::EmptyName);
        }

        Ok(Self { owner, name })
    }

    /// Parses `owner/name`, or a GitHub URL pointing into the repository.
    pub fn parse(s: &str) -> Result<Self, RepoError> {
        let s = s.trim();
        if s.starts_with("https://") || s.starts_with("http://") {
            return Self::parse_url(s);
        }

        match s.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] => Self::new(*owner, *name),
            _ => Err(RepoError::InvalidFormat(s.to_string())),
        }
    }

    /// Accepts `https://github.com/owner/name` with any trailing path, such
    /// as a pull request URL.
    pub fn parse_url(s: &str) -> Result<Self, RepoError> {
        let invalid = || RepoError::InvalidUrl(s.to_string());

        let url = url::Url::parse(s).map_err(|_| invalid())?;
        if url.host_str() != Some("github.com") {
            return Err(invalid());
        }

        let mut segments = url
            .path_segments()
            .ok_or_else(invalid)?
            .filter(|segment| !segment.is_empty());
        match (segments.next(), segments.next()) {
            (Some(owner), Some(name)) => Self::new(owner, name.trim_end_matches(".git")),
            _ => Err(invalid()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Repo {
    fn default() -> Self {
        Self {
            owner: DEFAULT_REPO_OWNER.to_string(),
            name: DEFAULT_REPO_NAME.to_string(),
        }
    }
}

impl TryFrom<String> for Repo {
    type Error = RepoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Head of the base branch at the start of a sweep. Every PR in the sweep is
/// compared against this commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseCommit {
    pub branch: String,
    pub sha: String,
}

impl BaseCommit {
    pub fn short_sha(&self) -> &str {
        short_sha(&self.sha)
    }
}

/// An open pull request, copied out of the forge's own model.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub head_ref: String,
    pub head_sha: String,
    pub base_ref: String,
}

impl PullRequest {
    pub fn short_sha(&self) -> &str {
        short_sha(&self.head_sha)
    }
}

/// A top-level comment on a pull request's conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Access to the hosting service for the swept repository.
///
/// Kept narrow so the sweep can run against an in-memory forge in tests.
#[async_trait]
pub trait Forge {
    /// Resolves the commit that `branch` currently points at.
    async fn fetch_branch_head(&self, repo: &Repo, branch: &str) -> Result<BaseCommit>;

    /// Lists open pull requests targeting `base`, newest first.
    async fn fetch_open_pull_requests(&self, repo: &Repo, base: &str) -> Result<Vec<PullRequest>>;

    /// Lists the conversation comments of a pull request, oldest first.
    async fn fetch_comments(&self, repo: &Repo, number: u64) -> Result<Vec<IssueComment>>;

    async fn create_comment(&self, repo: &Repo, number: u64, body: &str) -> Result<()>;

    async fn update_comment(&self, repo: &Repo, comment_id: u64, body: &str) -> Result<()>;
}
