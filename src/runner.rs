use std::{collections::VecDeque, path::PathBuf, process::Stdio};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, warn};

use crate::{
    git,
    types::{BaseCommit, PullRequest},
};

const REMOTE: &str = "origin";

/// Number of trailing stderr lines kept for the error message of a failed run.
const STDERR_TAIL: usize = 20;

/// Produces the CI report for one pull request.
#[async_trait]
pub trait CiRunner {
    /// Runs CI for the head of `pr` compared against `base` and returns the
    /// report text.
    async fn run(&self, pr: &PullRequest, base: &BaseCommit) -> Result<String>;
}

#[async_trait]
impl<T: CiRunner + Sync + ?Sized> CiRunner for &T {
    async fn run(&self, pr: &PullRequest, base: &BaseCommit) -> Result<String> {
        (**self).run(pr, base).await
    }
}

/// Runs the ci_tool crate from `ci_tool_dir` against a clone of the swept
/// repository in `working_dir`.
#[derive(Debug, Clone)]
pub struct CiTool {
    working_dir: PathBuf,
    ci_tool_dir: PathBuf,
}

impl CiTool {
    pub fn new(working_dir: impl Into<PathBuf>, ci_tool_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ci_tool_dir: ci_tool_dir.into(),
        }
    }

    /// Builds the `cargo run` invocation for one comparison.
    pub fn command(&self, head_sha: &str, base_sha: &str) -> Command {
        let mut command = Command::new("cargo");
        command
            .arg("run")
            .arg("--release")
            .arg("--quiet")
            .arg("--manifest-path")
            .arg(self.ci_tool_dir.join("Cargo.toml"))
            .arg("--")
            .arg(head_sha)
            .arg("--base")
            .arg(base_sha)
            .arg("--workspace-dir")
            .arg(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn prepare(&self, pr: &PullRequest, base: &BaseCommit) -> Result<()> {
        let dir = self.working_dir.as_path();

        if git::has_staged(dir).await? || git::has_unstaged(dir).await? {
            anyhow::bail!(
                "{} has staged or unstaged changes; refusing to run CI there",
                dir.display()
            );
        }

        git::fetch(dir, REMOTE, &base.branch).await?;
        git::fetch(dir, REMOTE, &format!("pull/{}/head", pr.number)).await?;

        let head = git::resolve_ref(dir, &pr.head_sha)
            .await
            .with_context(|| format!("Head of PR #{} was not fetched", pr.number))?;
        debug!("PR #{} head resolved to {head}", pr.number);

        Ok(())
    }

    async fn run_tool(&self, pr: &PullRequest, base: &BaseCommit) -> Result<String> {
        let mut child = self
            .command(&pr.head_sha, &base.sha)
            .spawn()
            .with_context(|| {
                format!("Failed to start cargo for {}", self.ci_tool_dir.display())
            })?;

        let mut stdout = child.stdout.take().context("ci tool stdout not captured")?;
        let stderr = child.stderr.take().context("ci tool stderr not captured")?;

        let collect_stdout = async {
            let mut buf = String::new();
            stdout.read_to_string(&mut buf).await.map(|_| buf)
        };

        let pr_number = pr.number;
        let follow_stderr = LinesStream::new(BufReader::new(stderr).lines()).fold(
            VecDeque::with_capacity(STDERR_TAIL),
            |mut tail, line| async move {
                match line {
                    Ok(line) => {
                        debug!("ci_tool[#{pr_number}]: {line}");
                        if tail.len() == STDERR_TAIL {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    Err(e) => warn!("Failed to read ci tool stderr: {e}"),
                }
                tail
            },
        );

        let (stdout, stderr_tail) = futures::join!(collect_stdout, follow_stderr);
        let status = child.wait().await.context("Failed to wait for ci tool")?;
        let stdout = stdout.context("Failed to read ci tool stdout")?;

        if !status.success() {
            anyhow::bail!(
                "ci tool failed for PR #{} ({}):\n{}",
                pr.number,
                status,
                Vec::from(stderr_tail).join("\n")
            );
        }

        Ok(stdout)
    }
}

#[async_trait]
impl CiRunner for CiTool {
    async fn run(&self, pr: &PullRequest, base: &BaseCommit) -> Result<String> {
        self.prepare(pr, base).await?;

        let result = self.run_tool(pr, base).await;

        // The tool leaves whichever commit it compared last checked out.
        if let Err(e) = git::checkout(&self.working_dir, &base.sha, true, true).await {
            warn!(
                "Failed to restore {} to {}: {e:#}",
                self.working_dir.display(),
                base.short_sha()
            );
        }

        result
    }
}
