use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::{config::Config, sweep::SweepSpec, types::Repo};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Parser, Default, Debug)]
#[command(
    name = "prbot",
    about = "Run the CI tool on every open pull request and keep a report comment on each one up to date"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// Force update comments even when the report has not changed
    #[arg(long)]
    pub force: bool,

    /// Path to the YAML config file
    #[arg(short = 'c', long, default_value = "config.yaml", value_name = "PATH")]
    pub config: PathBuf,

    /// Repository to sweep, overriding the config (OWNER/REPO or URL)
    #[arg(short = 'r', long, value_name = "OWNER/REPO")]
    pub repo: Option<String>,

    /// Base branch to compare against, overriding the config
    #[arg(short = 'b', long, value_name = "BRANCH")]
    pub base: Option<String>,

    /// Print reports instead of posting them
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Only update these PRs (must still be open against the base branch)
    #[arg(value_name = "PR-NUMBER")]
    pub prs: Vec<u64>,
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub config_path: PathBuf,
    pub force: bool,
    pub dry_run: bool,
    pub repo: Option<Repo>,
    pub base_branch: Option<String>,
    pub only: Vec<u64>,
}

impl RunSpec {
    /// Combines the command line with the config file; the command line wins.
    pub fn sweep_spec(&self, config: &Config) -> SweepSpec {
        SweepSpec {
            repo: self.repo.clone().unwrap_or_else(|| config.repo.clone()),
            base_branch: self
                .base_branch
                .clone()
                .unwrap_or_else(|| config.base_branch.clone()),
            only: self.only.clone(),
        }
    }
}

fn create_run_spec(cli: CliArgs) -> Result<RunSpec> {
    let repo = cli
        .repo
        .as_deref()
        .map(|r| {
            Repo::parse(r).map_err(|e| anyhow::anyhow!("Invalid repository format '{}': {}", r, e))
        })
        .transpose()?;

    let base_branch = match cli.base {
        Some(base) if base.trim().is_empty() => anyhow::bail!("--base cannot be empty"),
        other => other,
    };

    let mut only = cli.prs;
    only.sort_unstable();
    only.dedup();

    Ok(RunSpec {
        config_path: cli.config,
        force: cli.force,
        dry_run: cli.dry_run,
        repo,
        base_branch,
        only,
    })
}

/// Parses command-line arguments into a run specification.
///
/// Clap errors (including `--help` and `--version`) are returned unchanged
/// so the caller can pick the exit code.
pub fn parse_args<I, T>(args: I) -> Result<RunSpec>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    create_run_spec(cli)
}
