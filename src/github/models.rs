//! Data models returned by the GitHub REST API.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Represents a GitHub Actions workflow run from GitHub REST API.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub id: u64,
    pub workflow_id: u64,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub head_sha: Option<String>,
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    /// The SHA of the commit this run executed against, if it has one.
    pub fn head_commit_sha(&self) -> Option<&str> {
        self.head_commit.as_ref().map(|commit| commit.id.as_str())
    }
}

impl Display for WorkflowRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.head_branch {
            Some(branch) => write!(f, "run {} of workflow {} on {branch}", self.id, self.workflow_id),
            None => write!(f, "run {} of workflow {}", self.id, self.workflow_id),
        }
    }
}

/// The commit a workflow run was triggered for.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HeadCommit {
    pub id: String,
}

/// A page of workflow runs.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowRuns {
    pub workflow_runs: Vec<WorkflowRun>,
}

/// The fields of a repository the tagger cares about.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Repository {
    pub default_branch: String,
}

/// The result of comparing two commits.
#[derive(Debug, Deserialize, Clone)]
pub struct Comparison {
    pub commits: Vec<CommitRef>,
}

/// A bare commit reference.
#[derive(Debug, Deserialize, Clone)]
pub struct CommitRef {
    pub sha: String,
}

/// A single commit along with the files it changed.
#[derive(Debug, Deserialize, Clone)]
pub struct CommitDetail {
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

/// A file changed by a commit.
#[derive(Debug, Deserialize, Clone)]
pub struct CommitFile {
    pub filename: String,
}

/// Represents a pull request from GitHub REST API.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub user: Option<User>,
}

impl PullRequest {
    /// The names of the labels currently on the pull request.
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|label| label.name.clone()).collect()
    }

    /// The login of the pull request's author.
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.login.as_str())
    }

    /// The page a human would open, falling back to the API URL.
    pub fn link(&self) -> &str {
        self.html_url.as_deref().unwrap_or(&self.url)
    }
}

impl Display for PullRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} ({})", self.number, self.url)
    }
}

/// A label attached to an issue or pull request.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
}

/// A GitHub account.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub login: String,
}

/// The answer to a label update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelUpdate {
    /// The HTTP status code.
    pub status: u16,
    /// The reason phrase or error message accompanying a non-success status.
    pub reason: Option<String>,
}

impl LabelUpdate {
    /// Whether GitHub accepted the update.
    pub const fn is_success(&self) -> bool {
        self.status == 200
    }
}
