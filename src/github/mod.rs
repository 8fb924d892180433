//! The GitHub operations the tagger depends on.
//!
//! See: [`GitHubApi`], [`GitHubClient`]

use std::{fmt::Display, str::FromStr};

use async_trait::async_trait;

use crate::error::{Error, Result};

pub mod client;
pub mod models;

pub use client::GitHubClient;
pub use models::{LabelUpdate, PullRequest, Repository, WorkflowRun};

/// A repository on GitHub, written as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    /// The account owning the repository.
    pub owner: String,
    /// The repository name.
    pub name: String,
}

impl RepoRef {
    /// Creates a [`RepoRef`] from its parts.
    pub fn new<O, N>(owner: O, name: N) -> Self
    where
        O: Into<String>,
        N: Into<String>,
    {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(Error::validation(format!(
                "expected a repository as `owner/name`, got `{s}`"
            ))),
        }
    }
}

/// The capability set of the remote repository host.
///
/// Every stage of the pipeline talks to GitHub through this trait only, so the
/// stages can be exercised against in-memory implementations.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Fetches a single workflow run.
    async fn get_workflow_run(&self, repo: &RepoRef, run_id: u64) -> Result<WorkflowRun>;

    /// Fetches the repository itself, mainly for its default branch.
    async fn get_repository(&self, repo: &RepoRef) -> Result<Repository>;

    /// Lists successful runs of a workflow on a branch, most recent first.
    async fn list_successful_workflow_runs(
        &self,
        repo: &RepoRef,
        workflow_id: u64,
        branch: &str,
        per_page: u8,
    ) -> Result<Vec<WorkflowRun>>;

    /// Lists the commits in `base...head`, oldest first, excluding `base`.
    async fn compare_commits(&self, repo: &RepoRef, base: &str, head: &str)
    -> Result<Vec<String>>;

    /// Lists the file names a commit changed.
    async fn get_commit_files(&self, repo: &RepoRef, sha: &str) -> Result<Vec<String>>;

    /// Lists the pull requests associated with a commit.
    async fn list_pull_requests_for_commit(
        &self,
        repo: &RepoRef,
        sha: &str,
    ) -> Result<Vec<PullRequest>>;

    /// Replaces the labels of an issue or pull request.
    ///
    /// A non-success status is reported in the returned [`LabelUpdate`] rather
    /// than as an error.
    async fn update_issue_labels(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        labels: &[String],
    ) -> Result<LabelUpdate>;
}
