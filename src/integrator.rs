use std::{borrow::Cow, fmt};

use anyhow::Result;
use tracing::{debug, info};

use crate::{
    runner::CiRunner,
    types::{BaseCommit, Forge, IssueComment, PullRequest, Repo},
};

/// Hidden first line that identifies the report comment among a PR's other
/// comments.
pub const REPORT_MARKER: &str = "<!-- prbot:ci-report -->";

/// GitHub rejects comment bodies longer than 65536 characters. The rest is
/// left for the marker and heading.
pub const MAX_REPORT_CHARS: usize = 65_000;

const TRUNCATED_NOTE: &str = "\n\n(truncated)";

/// What happened to a pull request's report comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Created,
    Updated { comment_id: u64 },
    Unchanged { comment_id: u64 },
    Previewed,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Created => write!(f, "created report"),
            UpdateOutcome::Updated { comment_id } => write!(f, "updated report {comment_id}"),
            UpdateOutcome::Unchanged { comment_id } => write!(f, "report {comment_id} unchanged"),
            UpdateOutcome::Previewed => write!(f, "previewed report"),
        }
    }
}

/// Write needed to bring the report comment up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentPlan {
    Create,
    Update(u64),
    Skip(u64),
}

/// Decides how to publish `body` given the comments already on the PR.
///
/// Only the newest marked comment is considered; older duplicates are left
/// alone.
pub fn plan_comment(existing: &[IssueComment], body: &str, force: bool) -> CommentPlan {
    let current = existing
        .iter()
        .rev()
        .find(|comment| comment.body.starts_with(REPORT_MARKER));

    match current {
        None => CommentPlan::Create,
        Some(comment) if !force && comment.body.trim_end() == body.trim_end() => {
            CommentPlan::Skip(comment.id)
        }
        Some(comment) => CommentPlan::Update(comment.id),
    }
}

/// Cuts `report` down to at most `max_chars` characters, note included.
fn truncate_report(report: &str, max_chars: usize) -> Cow<'_, str> {
    if report.chars().count() <= max_chars {
        return Cow::Borrowed(report);
    }

    let keep = max_chars.saturating_sub(TRUNCATED_NOTE.chars().count());
    let end = report
        .char_indices()
        .nth(keep)
        .map_or(report.len(), |(i, _)| i);
    Cow::Owned(format!("{}{TRUNCATED_NOTE}", report[..end].trim_end()))
}

/// Wraps the CI tool's output into the report comment for `pr`.
pub fn render_comment(pr: &PullRequest, base: &BaseCommit, report: &str) -> String {
    let report = report.trim();
    let report = if report.is_empty() {
        Cow::Borrowed("No changes reported.")
    } else {
        truncate_report(report, MAX_REPORT_CHARS)
    };

    format!(
        "{REPORT_MARKER}\nCI report for `{}` ({}) against `{}` (`{}`)\n\n{report}\n",
        pr.short_sha(),
        pr.head_ref,
        base.branch,
        base.short_sha(),
    )
}

/// Runs CI for pull requests and keeps one report comment per PR current.
pub struct Integrator<R> {
    runner: R,
    force: bool,
    dry_run: bool,
}

impl<R: CiRunner + Sync> Integrator<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            force: false,
            dry_run: false,
        }
    }

    /// Rewrite the report even when its text has not changed.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Print reports to stdout instead of posting them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn update_pr<F>(
        &self,
        forge: &F,
        repo: &Repo,
        pr: &PullRequest,
        base: &BaseCommit,
    ) -> Result<UpdateOutcome>
    where
        F: Forge + Sync,
    {
        let report = self.runner.run(pr, base).await?;
        let body = render_comment(pr, base, &report);

        if self.dry_run {
            println!("--- {} ---\n{body}", pr.url);
            return Ok(UpdateOutcome::Previewed);
        }

        let existing = forge.fetch_comments(repo, pr.number).await?;
        let outcome = match plan_comment(&existing, &body, self.force) {
            CommentPlan::Create => {
                forge.create_comment(repo, pr.number, &body).await?;
                UpdateOutcome::Created
            }
            CommentPlan::Update(comment_id) => {
                forge.update_comment(repo, comment_id, &body).await?;
                UpdateOutcome::Updated { comment_id }
            }
            CommentPlan::Skip(comment_id) => {
                debug!("Report on #{} is already current", pr.number);
                UpdateOutcome::Unchanged { comment_id }
            }
        };

        info!("#{}: {outcome}", pr.number);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn comment(id: u64, body: &str) -> IssueComment {
        IssueComment {
            id,
            body: body.to_string(),
        }
    }

    fn pr() -> PullRequest {
        PullRequest {
            number: 7,
            title: "feat: add judge queue".to_string(),
            author: "alice".to_string(),
            url: "https://github.com/iruioj/zroj_core/pull/7".to_string(),
            created_at: Utc::now(),
            head_ref: "judge-queue".to_string(),
            head_sha: "aaaaaaaaaaaa".to_string(),
            base_ref: "master".to_string(),
        }
    }

    fn base() -> BaseCommit {
        BaseCommit {
            branch: "master".to_string(),
            sha: "bbbbbbbbbbbb".to_string(),
        }
    }

    #[test]
    fn creates_when_no_report_exists() {
        let existing = [comment(1, "LGTM"), comment(2, "please rebase")];
        assert_eq!(plan_comment(&existing, "body", false), CommentPlan::Create);
        assert_eq!(plan_comment(&[], "body", true), CommentPlan::Create);
    }

    #[test]
    fn skips_identical_report_unless_forced() {
        let body = render_comment(&pr(), &base(), "# Commits\n");
        let existing = [comment(1, "hi"), comment(5, &body)];

        assert_eq!(plan_comment(&existing, &body, false), CommentPlan::Skip(5));
        assert_eq!(plan_comment(&existing, &body, true), CommentPlan::Update(5));
    }

    #[test]
    fn updates_changed_report() {
        let old = render_comment(&pr(), &base(), "old output");
        let new = render_comment(&pr(), &base(), "new output");
        let existing = [comment(3, &old)];

        assert_eq!(plan_comment(&existing, &new, false), CommentPlan::Update(3));
    }

    #[test]
    fn targets_newest_marked_comment() {
        let old = render_comment(&pr(), &base(), "first");
        let newer = render_comment(&pr(), &base(), "second");
        let existing = [comment(3, &old), comment(9, &newer), comment(10, "thanks")];

        assert_eq!(plan_comment(&existing, &newer, false), CommentPlan::Skip(9));
        assert_eq!(plan_comment(&existing, &old, false), CommentPlan::Update(9));
    }

    #[test]
    fn trailing_whitespace_does_not_count_as_change() {
        let body = render_comment(&pr(), &base(), "output");
        let existing = [comment(4, body.trim_end())];

        assert_eq!(plan_comment(&existing, &body, false), CommentPlan::Skip(4));
    }

    #[test]
    fn rendered_comment_names_commits_and_carries_marker() {
        let body = render_comment(&pr(), &base(), "\n# API Changes\n\n");

        assert!(body.starts_with(REPORT_MARKER));
        assert!(body.contains("`aaaaaaa` (judge-queue) against `master` (`bbbbbbb`)"));
        assert!(body.ends_with("# API Changes\n"));
    }

    #[test]
    fn empty_output_renders_placeholder() {
        let body = render_comment(&pr(), &base(), "  \n");
        assert!(body.contains("No changes reported."));
    }

    #[test]
    fn oversized_report_fits_in_a_github_comment() {
        let report = "- `0123456` fix: é\n".repeat(10_000);
        let body = render_comment(&pr(), &base(), &report);

        assert!(body.chars().count() <= 65_536);
        assert!(body.ends_with("(truncated)\n"));
        assert!(body.contains("- `0123456` fix: é\n"));
    }

    #[test]
    fn report_at_the_limit_is_kept_whole() {
        let report = "x".repeat(MAX_REPORT_CHARS);
        assert_eq!(truncate_report(&report, MAX_REPORT_CHARS), report);

        let longer = "x".repeat(MAX_REPORT_CHARS + 1);
        let cut = truncate_report(&longer, MAX_REPORT_CHARS);
        assert_eq!(cut.chars().count(), MAX_REPORT_CHARS);
        assert!(cut.ends_with("(truncated)"));
    }
}
