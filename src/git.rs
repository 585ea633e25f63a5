//! Thin async wrappers around the `git` binary.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::process::Command;

fn git(dir: &Path) -> Command {
    let mut command = Command::new("git");
    command.current_dir(dir).kill_on_drop(true);
    command
}

/// Runs `git <args>` in `dir` and returns its trimmed stdout.
async fn trimmed_git_stdout(dir: &Path, args: &[&str]) -> Result<String> {
    let output = git(dir)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to run 'git {}'", args.join(" ")))?;

    if !output.status.success() {
        anyhow::bail!(
            "'git {}' failed in {}: {}",
            args.join(" "),
            dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Runs a `--quiet` diff command; exit status 1 means "there are differences".
async fn has_differences(dir: &Path, args: &[&str]) -> Result<bool> {
    let output = git(dir)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to run 'git {}'", args.join(" ")))?;

    match output.status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        Some(code) => anyhow::bail!(
            "'git {}' exited with {code} in {}: {}",
            args.join(" "),
            dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        None => anyhow::bail!("'git {}' was terminated by a signal", args.join(" ")),
    }
}

/// Whether the index holds changes that are not yet committed.
pub async fn has_staged(dir: &Path) -> Result<bool> {
    has_differences(dir, &["diff-index", "--quiet", "--cached", "HEAD", "--"]).await
}

/// Whether the working tree holds changes that could be staged.
pub async fn has_unstaged(dir: &Path) -> Result<bool> {
    has_differences(dir, &["diff-files", "--quiet"]).await
}

pub async fn fetch(dir: &Path, remote: &str, refspec: &str) -> Result<()> {
    trimmed_git_stdout(dir, &["fetch", "--quiet", remote, refspec]).await?;
    Ok(())
}

pub async fn checkout(dir: &Path, commit: &str, quiet: bool, force: bool) -> Result<()> {
    let mut args = vec!["checkout", commit];
    if quiet {
        args.push("--quiet");
    }
    if force {
        args.push("--force");
    }
    trimmed_git_stdout(dir, &args).await?;
    Ok(())
}

/// Resolves any committish (`HEAD`, a branch, a short SHA) to a full SHA.
pub async fn resolve_ref(dir: &Path, committish: &str) -> Result<String> {
    trimmed_git_stdout(dir, &["rev-parse", "--verify", &format!("{committish}^{{commit}}")])
        .await
}
