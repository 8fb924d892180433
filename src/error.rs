//! Errors raised while tagging the pull requests of a workflow run.

use thiserror::Error;

/// A shorthand for results carrying an [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while talking to GitHub or validating the configuration.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced run, repository or commit does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure, rate limit or server error.
    #[error("transient API error: {0}")]
    Transient(String),

    /// GitHub answered with a status the pipeline has no recovery for.
    #[error("request to {url} was rejected with {status}: {message}")]
    Rejected {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The message GitHub returned, if any.
        message: String,
    },

    /// Malformed or missing configuration.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Error {
    /// Whether GitHub reported the requested resource as missing.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the failure only concerns the requested commit, so the commit can be skipped
    /// instead of aborting the run.
    ///
    /// GitHub answers `404` or `422 No commit found for SHA` for commits rewritten away.
    pub const fn is_skippable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Rejected { .. })
    }

    pub(crate) fn validation<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::Validation(message.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(err.to_string())
    }
}
