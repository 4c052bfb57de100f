use std::fs;
use std::path::Path;
use std::process::Command;

use crate::error::Error;

/// Check out a single revision of a repository into `target_dir`
///
/// This uses the system git command, which automatically handles:
/// - SSH keys from ~/.ssh/
/// - Git credential helpers
/// - Personal access tokens
/// - Any authentication configured in ~/.gitconfig
///
/// Unlike `git clone --branch`, fetching into a fresh repository accepts any
/// revision the remote will serve: branches, tags, and full commit hashes.
/// A `depth` of 0 fetches full history.
///
/// A repository or revision starting with `-` is rejected before git runs.
pub fn checkout_revision(
    program: &str,
    url: &str,
    revision: &str,
    depth: u32,
    target_dir: &Path,
) -> Result<(), Error> {
    for (what, value) in [("repository", url), ("revision", revision)] {
        if value.starts_with('-') {
            return Err(Error::CheckoutFailed {
                repository: url.to_string(),
                revision: revision.to_string(),
                message: format!("{} must not start with '-'", what),
            });
        }
    }

    // Remove target directory if it exists (left over from a failed attempt)
    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }

    // Create parent directory if it doesn't exist
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let target = target_dir.to_string_lossy().to_string();
    run_git(program, url, revision, &["init", "--quiet", target.as_str()])?;

    let depth_arg = format!("--depth={}", depth);
    let mut fetch: Vec<&str> = vec!["-C", target.as_str(), "fetch", "--quiet"];
    if depth > 0 {
        fetch.push(depth_arg.as_str());
    }
    fetch.push("--");
    fetch.push(url);
    fetch.push(revision);
    run_git(program, url, revision, &fetch)?;

    run_git(
        program,
        url,
        revision,
        &[
            "-C",
            target.as_str(),
            "checkout",
            "--quiet",
            "--detach",
            "FETCH_HEAD",
        ],
    )
}

fn run_git(program: &str, url: &str, revision: &str, args: &[&str]) -> Result<(), Error> {
    log::debug!("running {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| Error::CheckoutFailed {
            repository: url.to_string(),
            revision: revision.to_string(),
            message: format!("failed to run {}: {}", program, e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Provide helpful error message for common auth failures
        let message = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "Authentication failed. Make sure you have access to the repository.\n\
                For private repos, ensure you have:\n\
                - SSH key added to ssh-agent\n\
                - Git credentials configured\n\
                - Personal access token set up\n\
                Error: {}",
                stderr.trim()
            )
        } else {
            format!("git {} failed: {}", git_verb(args), stderr.trim())
        };

        return Err(Error::CheckoutFailed {
            repository: url.to_string(),
            revision: revision.to_string(),
            message,
        });
    }

    Ok(())
}

/// The git subcommand in an argument list, skipping `-C <dir>`.
fn git_verb<'a>(args: &[&'a str]) -> &'a str {
    match args {
        ["-C", _, verb, ..] => *verb,
        [verb, ..] => *verb,
        [] => "",
    }
}
