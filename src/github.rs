use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::{Octocrab, params};
use serde::Deserialize;
use tracing::debug;

use crate::types::{BaseCommit, Forge, IssueComment, PullRequest, Repo};

const PER_PAGE: u8 = 100;

pub fn get_github_token() -> Result<String> {
    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("Failed to run 'gh auth token'")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// Creates an authenticated GitHub client.
pub fn setup_github_client(token: String) -> Result<Octocrab> {
    Octocrab::builder()
        .personal_token(token)
        .build()
        .context("Failed to create GitHub client")
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    name: String,
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

/// REST route for a branch, with every segment percent-encoded.
fn branch_route(repo: &Repo, branch: &str) -> Result<String> {
    let mut url = url::Url::parse("https://api.github.com/")?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("GitHub API URL cannot hold a path"))?
        .extend(["repos", repo.owner(), repo.name(), "branches", branch]);
    Ok(url.path().to_string())
}

/// `Forge` backed by the GitHub REST API.
pub struct GitHub {
    client: Octocrab,
}

impl GitHub {
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }

    pub fn with_token(token: String) -> Result<Self> {
        setup_github_client(token).map(Self::new)
    }
}

fn convert_pull_request(pr: octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        author: pr
            .user
            .map(|user| user.login)
            .unwrap_or_else(|| "Unknown".to_string()),
        url: pr.html_url.map(|url| url.to_string()).unwrap_or_default(),
        created_at: pr.created_at.unwrap_or_default(),
        head_ref: pr.head.ref_field,
        head_sha: pr.head.sha,
        base_ref: pr.base.ref_field,
    }
}

fn convert_comment(comment: octocrab::models::issues::Comment) -> IssueComment {
    IssueComment {
        id: comment.id.into_inner(),
        body: comment.body.unwrap_or_default(),
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn fetch_branch_head(&self, repo: &Repo, branch: &str) -> Result<BaseCommit> {
        let route = branch_route(repo, branch)?;
        let response: BranchResponse = self
            .client
            .get::<BranchResponse, _, ()>(route, None)
            .await
            .with_context(|| format!("Failed to look up branch '{branch}' in {repo}"))?;

        debug!("{repo}@{} is at {}", response.name, response.commit.sha);

        Ok(BaseCommit {
            branch: response.name,
            sha: response.commit.sha,
        })
    }

    async fn fetch_open_pull_requests(&self, repo: &Repo, base: &str) -> Result<Vec<PullRequest>> {
        let first_page = self
            .client
            .pulls(repo.owner(), repo.name())
            .list()
            .state(params::State::Open)
            .base(base)
            .sort(params::pulls::Sort::Created)
            .direction(params::Direction::Descending)
            .per_page(PER_PAGE)
            .send()
            .await
            .with_context(|| format!("Failed to list open pull requests in {repo}"))?;

        let prs = self
            .client
            .all_pages(first_page)
            .await
            .with_context(|| format!("Failed to page through pull requests in {repo}"))?;

        Ok(prs.into_iter().map(convert_pull_request).collect())
    }

    async fn fetch_comments(&self, repo: &Repo, number: u64) -> Result<Vec<IssueComment>> {
        let first_page = self
            .client
            .issues(repo.owner(), repo.name())
            .list_comments(number)
            .per_page(PER_PAGE)
            .send()
            .await
            .with_context(|| format!("Failed to list comments on {repo}#{number}"))?;

        let comments = self
            .client
            .all_pages(first_page)
            .await
            .with_context(|| format!("Failed to page through comments on {repo}#{number}"))?;

        Ok(comments.into_iter().map(convert_comment).collect())
    }

    async fn create_comment(&self, repo: &Repo, number: u64, body: &str) -> Result<()> {
        self.client
            .issues(repo.owner(), repo.name())
            .create_comment(number, body)
            .await
            .with_context(|| format!("Failed to comment on {repo}#{number}"))?;
        Ok(())
    }

    async fn update_comment(&self, repo: &Repo, comment_id: u64, body: &str) -> Result<()> {
        self.client
            .issues(repo.owner(), repo.name())
            .update_comment(comment_id.into(), body)
            .await
            .with_context(|| format!("Failed to update comment {comment_id} in {repo}"))?;
        Ok(())
    }
}
