use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use chrono::Utc;
use prbot::{BaseCommit, CiRunner, CiTool, PullRequest};
use tempfile::TempDir;

/// Stand-in for the ci_tool crate. It takes the same arguments, checks out
/// the PR head in the workspace, and fails noisily when that head contains a
/// `FAIL` file.
const FAKE_CI_TOOL: &str = r#"
use std::{path::Path, process::{Command, exit}};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let (dev, base, dir) = (&args[1], &args[3], &args[5]);

    let checked_out = Command::new("git")
        .current_dir(dir)
        .args(["checkout", "--quiet", dev])
        .status()
        .map(|status| status.success())
        .unwrap_or(false);
    if !checked_out {
        exit(2);
    }

    if Path::new(dir).join("FAIL").exists() {
        for i in 0..30 {
            eprintln!("line {i}");
        }
        exit(3);
    }

    println!("REPORT {dev} {base}");
}
"#;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args([
            "-c",
            "user.name=prbot",
            "-c",
            "user.email=prbot@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?}: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn commit_file(repo: &Path, name: &str, contents: &str, message: &str) -> String {
    fs::write(repo.join(name), contents).unwrap();
    git(repo, &["add", name]);
    git(repo, &["commit", "--quiet", "-m", message]);
    git(repo, &["rev-parse", "HEAD"])
}

/// An origin repository with a `master` branch and two pull request heads,
/// a clone of it to run CI in, and the fake ci_tool crate.
struct Fixture {
    _root: TempDir,
    working_dir: PathBuf,
    ci_tool_dir: PathBuf,
    base: BaseCommit,
    passing_head: String,
    failing_head: String,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let origin = root.path().join("origin");
        fs::create_dir(&origin).unwrap();

        git(&origin, &["init", "--quiet"]);
        git(&origin, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        let base_sha = commit_file(&origin, "README.md", "zroj\n", "chore: init");

        git(&origin, &["checkout", "--quiet", "-b", "feature"]);
        let passing_head = commit_file(&origin, "judge.rs", "fn judge() {}\n", "feat: judge");
        git(&origin, &["update-ref", "refs/pull/1/head", &passing_head]);

        git(&origin, &["checkout", "--quiet", "-b", "broken", "master"]);
        let failing_head = commit_file(&origin, "FAIL", "", "fix: oops");
        git(&origin, &["update-ref", "refs/pull/2/head", &failing_head]);
        git(&origin, &["checkout", "--quiet", "master"]);

        let working_dir = root.path().join("work");
        git(
            root.path(),
            &["clone", "--quiet", origin.to_str().unwrap(), "work"],
        );

        let ci_tool_dir = root.path().join("ci_tool");
        fs::create_dir_all(ci_tool_dir.join("src")).unwrap();
        fs::write(
            ci_tool_dir.join("Cargo.toml"),
            "[package]\nname = \"ci_tool\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[workspace]\n",
        )
        .unwrap();
        fs::write(ci_tool_dir.join("src/main.rs"), FAKE_CI_TOOL).unwrap();

        Self {
            _root: root,
            working_dir,
            ci_tool_dir,
            base: BaseCommit {
                branch: "master".to_string(),
                sha: base_sha,
            },
            passing_head,
            failing_head,
        }
    }

    fn tool(&self) -> CiTool {
        CiTool::new(&self.working_dir, &self.ci_tool_dir)
    }

    fn head(&self) -> String {
        git(&self.working_dir, &["rev-parse", "HEAD"])
    }
}

fn pull_request(number: u64, head_sha: &str) -> PullRequest {
    PullRequest {
        number,
        title: format!("PR {number}"),
        author: "alice".to_string(),
        url: format!("https://github.com/iruioj/zroj_core/pull/{number}"),
        created_at: Utc::now(),
        head_ref: format!("pr-{number}"),
        head_sha: head_sha.to_string(),
        base_ref: "master".to_string(),
    }
}

#[tokio::test]
async fn reports_tool_output_and_restores_base_checkout() {
    let fixture = Fixture::new();
    let pr = pull_request(1, &fixture.passing_head);

    let report = fixture.tool().run(&pr, &fixture.base).await.unwrap();

    assert_eq!(
        report,
        format!("REPORT {} {}\n", fixture.passing_head, fixture.base.sha)
    );
    assert_eq!(fixture.head(), fixture.base.sha);
}

#[tokio::test]
async fn failing_tool_reports_status_and_last_stderr_lines() {
    let fixture = Fixture::new();
    let pr = pull_request(2, &fixture.failing_head);

    let err = fixture.tool().run(&pr, &fixture.base).await.unwrap_err();
    let message = err.to_string();
    let mut lines = message.lines();

    let first = lines.next().unwrap();
    assert!(first.starts_with("ci tool failed for PR #2"), "{message}");
    assert!(first.contains("exit status: 3"), "{message}");

    let tail: Vec<&str> = lines.collect();
    let expected: Vec<String> = (10..30).map(|i| format!("line {i}")).collect();
    assert_eq!(tail, expected);

    // The tool left the PR head checked out; the runner puts the base back.
    assert_eq!(fixture.head(), fixture.base.sha);
}

#[tokio::test]
async fn refuses_dirty_working_tree() {
    let fixture = Fixture::new();
    fs::write(fixture.working_dir.join("README.md"), "local edit\n").unwrap();
    let pr = pull_request(1, &fixture.passing_head);

    let err = fixture.tool().run(&pr, &fixture.base).await.unwrap_err();

    assert!(
        err.to_string()
            .contains("has staged or unstaged changes; refusing to run CI there"),
        "{err:#}"
    );
    assert_eq!(
        fs::read_to_string(fixture.working_dir.join("README.md")).unwrap(),
        "local edit\n"
    );
}

#[tokio::test]
async fn unknown_pull_request_head_is_an_error() {
    let fixture = Fixture::new();
    let pr = pull_request(3, &fixture.passing_head);

    let err = fixture.tool().run(&pr, &fixture.base).await.unwrap_err();

    assert!(format!("{err:#}").contains("pull/3/head"), "{err:#}");
    assert_eq!(fixture.head(), fixture.base.sha);
}
