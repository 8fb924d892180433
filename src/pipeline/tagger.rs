use std::{collections::HashSet, fmt::Display};

use futures::{StreamExt as _, TryStreamExt as _, stream};
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    github::{GitHubApi, PullRequest, RepoRef},
    pipeline::report::RunReport,
};

/// What happened to one qualifying commit.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// GitHub associates no pull request with the commit.
    NoAssociatedPr,
    /// The pull request was labeled.
    Tagged {
        /// The pull request number.
        number: u64,
    },
    /// The pull request would have been labeled, but dry run is on.
    DryRunSkipped {
        /// The pull request number.
        number: u64,
    },
    /// The pull request was already handled through an earlier commit of this run.
    AlreadyQueued {
        /// The pull request number.
        number: u64,
    },
    /// GitHub refused the label update.
    Failed {
        /// The pull request number.
        number: u64,
        /// The status and message GitHub answered with.
        reason: String,
    },
}

impl TagOutcome {
    /// The pull request the outcome is about, if any.
    pub const fn number(&self) -> Option<u64> {
        match self {
            Self::NoAssociatedPr => None,
            Self::Tagged { number }
            | Self::DryRunSkipped { number }
            | Self::AlreadyQueued { number }
            | Self::Failed { number, .. } => Some(*number),
        }
    }
}

impl Display for TagOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAssociatedPr => write!(f, "no associated pull request"),
            Self::Tagged { number } => write!(f, "tagged #{number}"),
            Self::DryRunSkipped { number } => write!(f, "would tag #{number} (dry run)"),
            Self::AlreadyQueued { number } => write!(f, "#{number} already handled"),
            Self::Failed { number, reason } => write!(f, "failed to tag #{number}: {reason}"),
        }
    }
}

/// The outcome for one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// The commit SHA.
    pub sha: String,
    /// What happened to it.
    pub outcome: TagOutcome,
}

/// Accumulates the pull requests handled during one run.
///
/// A pull request number enters the ledger at most once; later commits reaching the same pull
/// request are recorded as [`TagOutcome::AlreadyQueued`].
#[derive(Debug, Default)]
pub struct TagLedger {
    seen: HashSet<u64>,
    outcomes: Vec<CommitOutcome>,
    report: RunReport,
}

impl TagLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a pull request as handled. Returns `false` if it already was.
    pub fn claim(&mut self, number: u64) -> bool {
        self.seen.insert(number)
    }

    /// Records what happened to a commit.
    pub fn record<S>(&mut self, sha: S, outcome: TagOutcome)
    where
        S: Into<String>,
    {
        self.outcomes.push(CommitOutcome {
            sha: sha.into(),
            outcome,
        });
    }

    /// Consumes the ledger, returning its outcomes and report.
    pub fn into_parts(self) -> (Vec<CommitOutcome>, RunReport) {
        (self.outcomes, self.report)
    }
}

/// The labels of a pull request after tagging it: its current labels plus `tag`, without duplicates.
pub fn with_tag(current: &[String], tag: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::with_capacity(current.len() + 1);
    for label in current.iter().map(String::as_str).chain([tag]) {
        if !labels.iter().any(|existing| existing == label) {
            labels.push(label.to_owned());
        }
    }
    labels
}

/// Labels the pull requests associated with the given commits.
#[derive(Debug)]
pub struct PrTagger<'a, A>
where
    A: GitHubApi + ?Sized,
{
    api: &'a A,
    repo: &'a RepoRef,
    tag: &'a str,
    dry_run: bool,
    concurrency: usize,
}

impl<'a, A> PrTagger<'a, A>
where
    A: GitHubApi + ?Sized,
{
    /// Creates a tagger applying `tag` in `repo`.
    pub const fn new(api: &'a A, repo: &'a RepoRef, tag: &'a str, dry_run: bool) -> Self {
        Self {
            api,
            repo,
            tag,
            dry_run,
            concurrency: 1,
        }
    }

    /// Sets how many pull request lookups run concurrently.
    #[must_use]
    pub const fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Tags the pull request of every commit, in order, recording each outcome in `ledger`.
    ///
    /// Lookups run concurrently, label updates one at a time. A refused label update is recorded
    /// and does not stop the remaining commits.
    ///
    /// # Errors
    ///
    /// Returns the first lookup or update error that is not [`crate::Error::is_skippable`].
    pub async fn tag_commits(&self, commits: &[String], ledger: &mut TagLedger) -> Result<()> {
        let lookups: Vec<(&String, Option<PullRequest>)> = stream::iter(commits)
            .map(|sha| async move { self.lookup(sha).await.map(|pr| (sha, pr)) })
            .buffered(self.concurrency.max(1))
            .try_collect()
            .await?;

        for (sha, pull_request) in lookups {
            let outcome = match pull_request {
                Some(pull_request) => self.apply(pull_request, ledger).await?,
                None => {
                    info!("no pull request found for commit {sha}");
                    TagOutcome::NoAssociatedPr
                }
            };
            ledger.record(sha.as_str(), outcome);
        }
        Ok(())
    }

    /// Finds the first pull request associated with a commit.
    async fn lookup(&self, sha: &str) -> Result<Option<PullRequest>> {
        debug!("looking up pull requests for commit {sha}…");
        match self.api.list_pull_requests_for_commit(self.repo, sha).await {
            Ok(pull_requests) => {
                if pull_requests.len() > 1 {
                    debug!(
                        "commit {sha} belongs to {} pull requests, using the first",
                        pull_requests.len()
                    );
                }
                Ok(pull_requests.into_iter().next())
            }
            Err(err) if err.is_skippable() => {
                warn!("skipping commit {sha}: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn apply(
        &self,
        pull_request: PullRequest,
        ledger: &mut TagLedger,
    ) -> Result<TagOutcome> {
        let number = pull_request.number;
        if !ledger.claim(number) {
            debug!("pull request {pull_request} was already handled in this run");
            return Ok(TagOutcome::AlreadyQueued { number });
        }

        let url = &pull_request.url;
        let tag = self.tag;
        if self.dry_run {
            info!("dry run: tagged pull request {url} with {tag}");
            ledger.report.push(&pull_request);
            return Ok(TagOutcome::DryRunSkipped { number });
        }

        let labels = with_tag(&pull_request.label_names(), tag);
        let update = self
            .api
            .update_issue_labels(self.repo, number, &labels)
            .await?;

        if update.is_success() {
            info!("successfully tagged pull request {url} with {tag}");
            ledger.report.push(&pull_request);
            Ok(TagOutcome::Tagged { number })
        } else {
            let reason = match &update.reason {
                Some(reason) => format!("{} {reason}", update.status),
                None => update.status.to_string(),
            };
            warn!("failed to update pull request {url} with the new tag: {reason}");
            Ok(TagOutcome::Failed { number, reason })
        }
    }
}
