//! Build script for prbot: embeds `BUILD_INFO_HUMAN` for `--version`.
//!
//! The string is `{CARGO_PKG_VERSION} ({git version}) {rustc --version}`.
//! The git version is `git describe --tags --always --dirty` when a tag is
//! reachable, otherwise `v{CARGO_PKG_VERSION}-{timestamp}-{commit}[+dirty]`.
//! Missing pieces are left out rather than failing the build.

use std::process::Command;

use chrono::Utc;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `None` outside a git checkout. `.cargo-ok` is written by `cargo install
/// --git` and does not count as a local change.
fn worktree_dirty() -> Option<bool> {
    run("git", &["rev-parse", "--git-dir"])?;
    let status = run("git", &["status", "--porcelain"]).unwrap_or_default();
    Some(
        status
            .lines()
            .filter_map(|line| line.get(3..))
            .any(|path| path != ".cargo-ok"),
    )
}

fn pseudo_version() -> String {
    let commit =
        run("git", &["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let dirty = worktree_dirty();

    // Clean checkouts use the commit time so rebuilding the same commit is stable.
    let timestamp = match dirty {
        Some(false) => run("git", &["log", "-1", "--format=%ct"])
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string()),
        _ => None,
    }
    .unwrap_or_else(|| Utc::now().format(TIMESTAMP_FORMAT).to_string());

    let suffix = if dirty == Some(true) { "+dirty" } else { "" };
    format!("v{}-{timestamp}-{commit}{suffix}", env!("CARGO_PKG_VERSION"))
}

fn git_version() -> String {
    match run("git", &["describe", "--tags", "--always", "--dirty"]) {
        Some(desc) if desc.contains('v') || desc.contains("-g") => desc,
        _ => pseudo_version(),
    }
}

fn build_info() -> String {
    [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        Some(format!("({})", git_version())),
        run("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}
