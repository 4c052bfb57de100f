//! End-to-end tests for the `exec` and `batch` commands.
//!
//! These check out a throwaway local git repository, so they need `git` on
//! the PATH and are skipped without it.

mod common;
use common::prelude::*;

fn setup() -> Option<(assert_fs::TempDir, std::path::PathBuf, String)> {
    if !git_available() {
        eprintln!("Skipping: git is not available");
        return None;
    }
    let temp = assert_fs::TempDir::new().unwrap();
    let (origin, branch) = git_fixture(temp.path());
    Some((temp, origin, branch))
}

/// Test that exec runs the command inside the checkout
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_exec_runs_command_in_checkout() {
    let Some((temp, origin, branch)) = setup() else {
        return;
    };
    let root = temp.child("pool");
    let mut cmd = cargo_bin_cmd!("checkout-pool");

    cmd.arg("--root")
        .arg(root.path())
        .arg("exec")
        .arg("--repo")
        .arg(&origin)
        .args(["--rev", branch.as_str(), "--", "cat", "hello.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from the fixture"));

    // Shutdown removed the checkout.
    assert_eq!(checkout_dir_count(root.path()), 0);
}

/// Test that exec exits with the command's exit code
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_exec_propagates_exit_code() {
    let Some((temp, origin, branch)) = setup() else {
        return;
    };
    let mut cmd = cargo_bin_cmd!("checkout-pool");

    cmd.arg("--root")
        .arg(temp.child("pool").path())
        .arg("exec")
        .arg("--repo")
        .arg(&origin)
        .args(["--rev", branch.as_str(), "--", "sh", "-c", "exit 3"])
        .assert()
        .code(3);
}

/// Test that exec --keep leaves the checkout on disk
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_exec_keep() {
    let Some((temp, origin, branch)) = setup() else {
        return;
    };
    let root = temp.child("pool");
    let mut cmd = cargo_bin_cmd!("checkout-pool");

    cmd.arg("--root")
        .arg(root.path())
        .arg("exec")
        .arg("--keep")
        .arg("--repo")
        .arg(&origin)
        .args(["--rev", branch.as_str(), "--", "true"])
        .assert()
        .success();

    assert_eq!(checkout_dir_count(root.path()), 1);
}

/// Test that an unknown revision fails cleanly and leaves nothing behind
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_exec_unknown_revision() {
    let Some((temp, origin, _branch)) = setup() else {
        return;
    };
    let root = temp.child("pool");
    let mut cmd = cargo_bin_cmd!("checkout-pool");

    cmd.arg("--root")
        .arg(root.path())
        .arg("exec")
        .arg("--repo")
        .arg(&origin)
        .args(["--rev", "no-such-branch", "--", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-branch"));

    assert_eq!(checkout_dir_count(root.path()), 0);
}

/// Test that batch runs every job and reports a summary
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_batch_runs_jobs() {
    let Some((temp, origin, branch)) = setup() else {
        return;
    };
    let origin = origin.display().to_string();
    let jobs = temp.child("jobs.yaml");
    jobs.write_str(&format!(
        "- repo: {origin}\n  rev: {branch}\n  command: [cat, hello.txt]\n\
         - repo: {origin}\n  rev: {branch}\n  command: [test, -f, hello.txt]\n\
         - repo: {origin}\n  rev: {branch}\n  variant: {{ arch: arm64 }}\n  command: [ls]\n"
    ))
    .unwrap();
    let mut cmd = cargo_bin_cmd!("checkout-pool");

    cmd.arg("--root")
        .arg(temp.child("pool").path())
        .arg("--max-checkouts")
        .arg("1")
        .arg("batch")
        .arg(jobs.path())
        .args(["--jobs", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 succeeded, 0 failed"));
}

/// Test that a failing job makes batch fail
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_batch_reports_failures() {
    let Some((temp, origin, branch)) = setup() else {
        return;
    };
    let origin = origin.display().to_string();
    let jobs = temp.child("jobs.yaml");
    jobs.write_str(&format!(
        "- repo: {origin}\n  rev: {branch}\n  command: [sh, -c, 'exit 2']\n"
    ))
    .unwrap();
    let mut cmd = cargo_bin_cmd!("checkout-pool");

    cmd.arg("--root")
        .arg(temp.child("pool").path())
        .arg("batch")
        .arg(jobs.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("exited with 2"))
        .stderr(predicate::str::contains("1 of 1 jobs failed"));
}
