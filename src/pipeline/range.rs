use tracing::{debug, info};

use crate::{
    error::Result,
    github::{GitHubApi, RepoRef},
};

/// Lists the commits after `base` up to and including `head`, oldest first.
///
/// Without a base the history reachable from `head` is unbounded, so the range is `head` alone.
///
/// # Errors
///
/// Returns [`crate::Error::NotFound`] if either commit is unknown to GitHub, or any other error
/// raised by the comparison.
pub async fn fetch_commit_range<A>(
    api: &A,
    repo: &RepoRef,
    base: Option<&str>,
    head: &str,
) -> Result<Vec<String>>
where
    A: GitHubApi + ?Sized,
{
    let Some(base) = base else {
        debug!("no baseline, the range is {head} alone");
        return Ok(vec![head.to_owned()]);
    };

    debug!("comparing {base}...{head}…");
    let commits = api.compare_commits(repo, base, head).await?;
    match commits.len() {
        1 => info!("1 commit since {base}"),
        count => info!("{count} commits since {base}"),
    }
    Ok(commits)
}
