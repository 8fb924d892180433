//! Tags the pull requests that went into a GitHub Actions workflow run.
//!
//! The pull requests of a run are the one of its head commit, plus, when path patterns are
//! configured, those of every commit since the last successful run of the same workflow on the same
//! branch that touched a matching path.
//!
//! See: [`pipeline::run`]

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod github;
pub mod pipeline;

pub use config::RunOptions;
pub use error::{Error, Result};
pub use github::{GitHubApi, GitHubClient, RepoRef};
pub use pipeline::{RunSummary, run};
