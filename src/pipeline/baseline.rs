use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    error::Result,
    github::{GitHubApi, RepoRef, WorkflowRun},
};

/// The last successful run the current run is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    /// The id of the baseline run.
    pub run_id: u64,
    /// The commit the baseline run executed against.
    pub sha: String,
    /// When the baseline run was created, if GitHub reported it.
    pub created_at: Option<DateTime<Utc>>,
}

/// Finds the most recent successful run of the workflow on `branch`, other than `current_run_id`.
///
/// Only the `window` most recent successful runs are considered. [`None`] means the branch has no
/// earlier successful run.
///
/// # Errors
///
/// Returns any error raised while listing the runs.
pub async fn locate_baseline<A>(
    api: &A,
    repo: &RepoRef,
    workflow_id: u64,
    branch: &str,
    current_run_id: u64,
    window: u8,
) -> Result<Option<Baseline>>
where
    A: GitHubApi + ?Sized,
{
    debug!("listing up to {window} successful runs of workflow {workflow_id} on {branch}…");
    let runs = api
        .list_successful_workflow_runs(repo, workflow_id, branch, window)
        .await?;

    let baseline = select_baseline(&runs, current_run_id);
    match &baseline {
        Some(Baseline {
            run_id,
            sha,
            created_at: Some(created_at),
        }) => info!("baseline is run {run_id} at {sha} from {created_at}"),
        Some(Baseline { run_id, sha, .. }) => info!("baseline is run {run_id} at {sha}"),
        None => info!("no earlier successful run of workflow {workflow_id} on {branch}"),
    }
    Ok(baseline)
}

/// Picks the first run that is not the current one and has a head commit.
///
/// `runs` are expected most recent first.
pub fn select_baseline(runs: &[WorkflowRun], current_run_id: u64) -> Option<Baseline> {
    runs.iter()
        .filter(|run| run.id != current_run_id)
        .find_map(|run| {
            let sha = run
                .head_sha
                .clone()
                .or_else(|| run.head_commit_sha().map(str::to_owned))?;
            Some(Baseline {
                run_id: run.id,
                sha,
                created_at: run.created_at,
            })
        })
}
