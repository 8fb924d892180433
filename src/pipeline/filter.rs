use futures::{StreamExt as _, TryStreamExt as _, stream};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    github::{GitHubApi, RepoRef},
};

/// Selects commits by the files they changed.
///
/// Patterns use shell glob syntax: `*` and `?` stay within one path segment, `**` spans any
/// number of segments, and `{a,b}` and `[abc]` work as usual.
#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<String>,
    set: GlobSet,
}

impl PathFilter {
    /// Compiles the patterns. An empty list yields [`None`], meaning no path filtering.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a pattern is not a valid glob.
    pub fn new<S>(patterns: &[S]) -> Result<Option<Self>>
    where
        S: AsRef<str>,
    {
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|err| Error::validation(format!("invalid path pattern: {err}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|err| Error::validation(format!("invalid path patterns: {err}")))?;

        Ok(Some(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_owned()).collect(),
            set,
        }))
    }

    /// Whether `path` matches any pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.set.is_match(path.replace('\\', "/"))
    }

    /// Whether any of `files` matches any pattern.
    pub fn matches_any<S>(&self, files: &[S]) -> bool
    where
        S: AsRef<str>,
    {
        files.iter().any(|file| self.matches(file.as_ref()))
    }

    /// Keeps the commits that changed at least one matching file, preserving their order.
    ///
    /// Each commit's files are fetched separately, up to `concurrency` at once. A commit GitHub no
    /// longer knows about or refuses to describe is skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error that is not [`Error::is_skippable`]; no partial result is returned.
    pub async fn filter_commits<A>(
        &self,
        api: &A,
        repo: &RepoRef,
        commits: &[String],
        concurrency: usize,
    ) -> Result<Vec<String>>
    where
        A: GitHubApi + ?Sized,
    {
        debug!(
            "checking {} commits against {} path patterns…",
            commits.len(),
            self.patterns.len()
        );

        let qualifying: Vec<Option<String>> = stream::iter(commits)
            .map(|sha| async move {
                match api.get_commit_files(repo, sha).await {
                    Ok(files) if self.matches_any(files.as_slice()) => {
                        debug!("commit {sha} touches a matching path");
                        Ok(Some(sha.clone()))
                    }
                    Ok(_) => Ok(None),
                    Err(err) if err.is_skippable() => {
                        warn!("skipping commit {sha}: {err}");
                        Ok(None)
                    }
                    Err(err) => Err(err),
                }
            })
            .buffered(concurrency.max(1))
            .try_collect()
            .await?;

        let qualifying: Vec<String> = qualifying.into_iter().flatten().collect();
        info!(
            "{} of {} commits touch {}",
            qualifying.len(),
            commits.len(),
            self.patterns.join(", ")
        );
        Ok(qualifying)
    }
}
