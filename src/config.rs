//! Options controlling a single tagging run.

use crate::{
    error::{Error, Result},
    github::RepoRef,
    pipeline::PathFilter,
};

/// How many recent successful runs the baseline locator looks at by default.
pub const DEFAULT_BASELINE_WINDOW: u8 = 10;

/// How many independent reads are in flight at once by default.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// The options of a tagging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// The repository the workflow run belongs to.
    pub repo: RepoRef,
    /// The workflow run whose pull requests are tagged.
    pub run_id: u64,
    /// The label to apply.
    pub tag: String,
    /// Reports what would be tagged without updating any pull request.
    pub dry_run: bool,
    /// Globs selecting the commits of the run's range that count. Empty disables path filtering.
    pub paths: Vec<String>,
    /// How many recent successful runs are considered when looking for the baseline.
    pub baseline_window: u8,
    /// How many commit lookups run concurrently.
    pub concurrency: usize,
}

impl RunOptions {
    /// Creates options with the default baseline window and concurrency, no path filter, and dry run off.
    pub fn new<T>(repo: RepoRef, run_id: u64, tag: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            repo,
            run_id,
            tag: tag.into(),
            dry_run: false,
            paths: Vec::new(),
            baseline_window: DEFAULT_BASELINE_WINDOW,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Checks the options and compiles the path filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the tag is blank, the baseline window is outside `1..=100`,
    /// the concurrency is zero, or a path pattern is not a valid glob.
    pub fn validate(&self) -> Result<Option<PathFilter>> {
        if self.tag.trim().is_empty() {
            return Err(Error::validation("the tag must not be empty"));
        }
        if !(1..=100).contains(&self.baseline_window) {
            return Err(Error::validation(format!(
                "the baseline window must be between 1 and 100, got {}",
                self.baseline_window
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::validation("the concurrency must be at least 1"));
        }
        PathFilter::new(self.paths.as_slice())
    }
}

/// Splits a comma or newline separated list of path patterns, dropping blank entries.
pub fn parse_paths(input: &str) -> Vec<String> {
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(str::to_owned)
        .collect()
}
