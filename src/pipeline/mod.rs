//! Finds the pull requests that went into a workflow run and tags them.
//!
//! A run goes through five stages, each in its own module:
//!
//! 1. [`resolve_run_context`] loads the run and the branch it is scoped to.
//! 2. [`locate_baseline`] finds the last earlier successful run of the same workflow on that branch.
//! 3. [`fetch_commit_range`] lists the commits since the baseline.
//! 4. [`PathFilter::filter_commits`] keeps the commits touching the configured paths.
//! 5. [`PrTagger::tag_commits`] labels the pull request of the head commit and of every kept commit.
//!
//! See: [`run`]

mod baseline;
mod context;
mod filter;
mod range;
mod report;
mod tagger;

pub use baseline::*;
pub use context::*;
pub use filter::*;
pub use range::*;
pub use report::*;
pub use tagger::*;

use tracing::info;

use crate::{config::RunOptions, error::Result, github::GitHubApi};

/// Everything a run found out and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// The id of the tagged workflow run.
    pub run_id: u64,
    /// The branch the run was scoped to.
    pub branch: String,
    /// The commit the run executed against. [`None`] if the run has no head commit.
    pub head_sha: Option<String>,
    /// The last earlier successful run. [`None`] if there is none or path filtering is off.
    pub baseline: Option<Baseline>,
    /// The commits whose pull requests were looked up, head commit first.
    pub qualifying_commits: Vec<String>,
    /// What happened to each qualifying commit.
    pub outcomes: Vec<CommitOutcome>,
    /// The pull requests tagged, for the human readable summary.
    pub report: RunReport,
}

/// Tags the pull requests of a workflow run.
///
/// The head commit's pull request is always tagged. With path patterns, so are the pull requests
/// of the commits since the baseline that touched a matching path. Each pull request is tagged at
/// most once.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] before any request if the options are invalid. Returns
/// any API error that is fatal to a stage; no summary is produced in that case.
pub async fn run<A>(api: &A, options: &RunOptions) -> Result<RunSummary>
where
    A: GitHubApi + ?Sized,
{
    let path_filter = options.validate()?;
    let repo = &options.repo;

    let RunContext { run, branch } = resolve_run_context(api, repo, options.run_id).await?;
    let mut summary = RunSummary {
        run_id: run.id,
        branch,
        head_sha: run.head_commit_sha().map(str::to_owned),
        baseline: None,
        qualifying_commits: Vec::new(),
        outcomes: Vec::new(),
        report: RunReport::default(),
    };

    let Some(head_sha) = summary.head_sha.clone() else {
        info!("{run} has no head commit, nothing to tag");
        return Ok(summary);
    };

    let mut qualifying = vec![head_sha.clone()];
    if let Some(path_filter) = &path_filter {
        let baseline = locate_baseline(
            api,
            repo,
            run.workflow_id,
            &summary.branch,
            run.id,
            options.baseline_window,
        )
        .await?;
        let range = fetch_commit_range(
            api,
            repo,
            baseline.as_ref().map(|baseline| baseline.sha.as_str()),
            &head_sha,
        )
        .await?;
        let filtered = path_filter
            .filter_commits(api, repo, &range, options.concurrency)
            .await?;

        for sha in filtered {
            if !qualifying.contains(&sha) {
                qualifying.push(sha);
            }
        }
        summary.baseline = baseline;
    }

    let mut ledger = TagLedger::new();
    PrTagger::new(api, repo, &options.tag, options.dry_run)
        .concurrency(options.concurrency)
        .tag_commits(&qualifying, &mut ledger)
        .await?;

    let (outcomes, report) = ledger.into_parts();
    info!(
        "handled {} commits of {run}, {} pull requests tagged with {}",
        qualifying.len(),
        report.len(),
        options.tag
    );

    summary.qualifying_commits = qualifying;
    summary.outcomes = outcomes;
    summary.report = report;
    Ok(summary)
}
