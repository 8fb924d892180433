use tracing::{debug, info};

use crate::{
    error::Result,
    github::{GitHubApi, RepoRef, WorkflowRun},
};

/// The workflow run being tagged and the branch it is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// The workflow run.
    pub run: WorkflowRun,
    /// The run's head branch, or the repository's default branch if the run has none.
    pub branch: String,
}

/// Loads the workflow run and the repository's default branch.
///
/// # Errors
///
/// Returns [`crate::Error::NotFound`] if the run or the repository does not exist,
/// or any other error raised by the API.
pub async fn resolve_run_context<A>(api: &A, repo: &RepoRef, run_id: u64) -> Result<RunContext>
where
    A: GitHubApi + ?Sized,
{
    debug!("loading run {run_id} of {repo}…");
    let (repository, run) = tokio::try_join!(
        api.get_repository(repo),
        api.get_workflow_run(repo, run_id)
    )?;

    let branch = match &run.head_branch {
        Some(branch) if !branch.is_empty() => branch.clone(),
        _ => {
            debug!(
                "run {run_id} has no head branch, using default branch {}",
                repository.default_branch
            );
            repository.default_branch
        }
    };

    info!("loaded {run}, scoped to branch {branch}");
    Ok(RunContext { run, branch })
}
