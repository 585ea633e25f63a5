//! prbot: keeps a CI report comment current on every open pull request.
//!
//! Lists the open pull requests that target a base branch, runs an external
//! CI tool against each one in a local checkout, and creates or updates a
//! single marked report comment per pull request.

pub mod cli;
pub mod config;
pub mod git;
pub mod github;
pub mod integrator;
pub mod runner;
pub mod sweep;
pub mod types;

pub use cli::{RunSpec, parse_args};
pub use config::Config;
pub use github::GitHub;
pub use integrator::{CommentPlan, Integrator, REPORT_MARKER, UpdateOutcome};
pub use runner::{CiRunner, CiTool};
pub use sweep::{SweepReport, SweepSpec, sweep_pull_requests};
pub use types::{BaseCommit, Forge, IssueComment, PullRequest, Repo, RepoError};
