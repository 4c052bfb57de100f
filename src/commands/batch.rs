//! # Batch Command Implementation
//!
//! Runs a list of jobs in parallel through one shared pool. Each job names a
//! repository, revision, optional variant tags and a command:
//!
//! ```yaml
//! - repo: https://github.com/rust-lang/log.git
//!   rev: master
//!   command: [cargo, test]
//! - repo: https://github.com/rust-lang/log.git
//!   rev: master
//!   variant: { features: std }
//!   command: [cargo, test, --features, std]
//! ```
//!
//! Jobs with the same repository, revision and variant share one checkout.
//! When every slot is busy, an acquire backs off and tries again until
//! `--wait` has elapsed.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use rayon::prelude::*;
use serde::Deserialize;

use checkout_pool::config::{self, PoolConfig};
use checkout_pool::error::Error;
use checkout_pool::key::Variant;
use checkout_pool::pool::{Checkout, Pool};

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Run a file of jobs in parallel
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// YAML file listing the jobs.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Number of jobs to run at once.
    #[arg(short, long, value_name = "N", default_value_t = 4)]
    pub jobs: usize,

    /// How long a job keeps retrying while the pool is exhausted.
    #[arg(long, value_name = "DURATION", default_value = "10m")]
    pub wait: String,
}

/// One entry of the jobs file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    pub repo: String,
    pub rev: String,
    #[serde(default)]
    pub variant: Variant,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum JobStatus {
    Succeeded,
    Failed(Option<i32>),
    Error(String),
}

/// Execute the `batch` command.
pub fn execute(args: BatchArgs, config: &PoolConfig) -> Result<()> {
    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let jobs = parse_jobs(&content)?;
    if jobs.is_empty() {
        println!("No jobs in {}", args.file.display());
        return Ok(());
    }
    let wait = config::parse_duration(&args.wait)?;

    let pool = Pool::with_git(config.clone())?;
    let workers = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.max(1))
        .build()?;
    let statuses: Vec<JobStatus> =
        workers.install(|| jobs.par_iter().map(|job| run_job(&pool, job, wait)).collect());
    pool.shutdown()?;

    println!("\nBatch summary:\n");
    let mut failures = 0usize;
    for (job, status) in jobs.iter().zip(&statuses) {
        let label = format!("{}@{}", job.repo, job.rev);
        match status {
            JobStatus::Succeeded => println!("  ✅ {label}: {}", job.command.join(" ")),
            JobStatus::Failed(code) => {
                failures += 1;
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                println!("  ❌ {label}: exited with {code}");
            }
            JobStatus::Error(message) => {
                failures += 1;
                println!("  ❌ {label}: {message}");
            }
        }
    }
    println!(
        "\n{} succeeded, {} failed",
        statuses.len() - failures,
        failures
    );

    if failures > 0 {
        anyhow::bail!("{failures} of {} jobs failed", statuses.len());
    }
    Ok(())
}

/// Parse the jobs file.
pub fn parse_jobs(content: &str) -> Result<Vec<Job>> {
    if content
        .lines()
        .all(|l| l.trim().is_empty() || l.trim_start().starts_with('#'))
    {
        return Ok(Vec::new());
    }
    let jobs: Vec<Job> = serde_yaml::from_str(content).context("Failed to parse jobs file")?;
    for (index, job) in jobs.iter().enumerate() {
        if job.command.is_empty() {
            anyhow::bail!(
                "Job {} ({}@{}) has an empty command",
                index + 1,
                job.repo,
                job.rev
            );
        }
    }
    Ok(jobs)
}

fn run_job(pool: &Pool, job: &Job, wait: Duration) -> JobStatus {
    let checkout = match acquire_with_backoff(pool, job, wait) {
        Ok(checkout) => checkout,
        Err(e) => return JobStatus::Error(e.to_string()),
    };

    let (program, program_args) = job.command.split_at(1);
    let status = Command::new(&program[0])
        .args(program_args)
        .current_dir(checkout.path())
        .status();
    pool.release(checkout.key());

    match status {
        Ok(status) if status.success() => JobStatus::Succeeded,
        Ok(status) => JobStatus::Failed(status.code()),
        Err(e) => JobStatus::Error(format!("failed to run {}: {}", program[0], e)),
    }
}

fn acquire_with_backoff(
    pool: &Pool,
    job: &Job,
    wait: Duration,
) -> checkout_pool::error::Result<Checkout> {
    // No deadline when `wait` runs past the end of the clock.
    let give_up = Instant::now().checked_add(wait);
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match pool.acquire(&job.repo, &job.rev, &job.variant) {
            Err(Error::Exhausted { capacity }) if give_up.is_none_or(|at| Instant::now() < at) => {
                log::debug!(
                    "pool of {} exhausted, retrying {}@{} in {:?}",
                    capacity,
                    job.repo,
                    job.rev,
                    backoff
                );
                thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            result => return result,
        }
    }
}
