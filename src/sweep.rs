use anyhow::Result;
use tracing::{debug, info, warn};

use crate::{
    integrator::{Integrator, UpdateOutcome},
    runner::CiRunner,
    types::{BaseCommit, Forge, PullRequest, Repo},
};

/// Which repository, branch and pull requests a sweep covers.
#[derive(Debug, Clone)]
pub struct SweepSpec {
    pub repo: Repo,
    pub base_branch: String,
    /// Restricts the sweep to these PR numbers when non-empty.
    pub only: Vec<u64>,
}

/// Per-PR results of a completed sweep, in visiting order.
#[derive(Debug)]
pub struct SweepReport {
    pub base: BaseCommit,
    pub outcomes: Vec<(u64, UpdateOutcome)>,
}

impl SweepReport {
    pub fn count(&self, pred: impl Fn(&UpdateOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, outcome)| pred(outcome)).count()
    }
}

fn select_pull_requests(prs: Vec<PullRequest>, only: &[u64]) -> Vec<PullRequest> {
    if only.is_empty() {
        return prs;
    }

    for number in only {
        if !prs.iter().any(|pr| pr.number == *number) {
            warn!("PR #{number} is not open against the base branch; skipping");
        }
    }

    prs.into_iter()
        .filter(|pr| only.contains(&pr.number))
        .collect()
}

/// Runs the integrator over every open pull request against the base branch.
///
/// Pull requests are processed one at a time in the order the forge lists
/// them. The first failure ends the sweep.
pub async fn sweep_pull_requests<F, R>(
    spec: &SweepSpec,
    forge: &F,
    integrator: &Integrator<R>,
) -> Result<SweepReport>
where
    F: Forge + Sync,
    R: CiRunner + Sync,
{
    info!("Fetching {} info", spec.repo);
    let base = forge
        .fetch_branch_head(&spec.repo, &spec.base_branch)
        .await?;

    let prs = forge
        .fetch_open_pull_requests(&spec.repo, &spec.base_branch)
        .await?;
    let prs = select_pull_requests(prs, &spec.only);
    let total = prs.len();

    let mut outcomes = Vec::with_capacity(total);
    for (i, pr) in prs.iter().enumerate() {
        info!("[{}/{}] update pr: {} (by {})", i + 1, total, pr.title, pr.author);
        debug!("{} opened {}", pr.url, pr.created_at.format("%Y-%m-%d %H:%M UTC"));
        let outcome = integrator.update_pr(forge, &spec.repo, pr, &base).await?;
        outcomes.push((pr.number, outcome));
    }

    Ok(SweepReport { base, outcomes })
}
