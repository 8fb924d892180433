//! Command-line arguments and their resolution against the GitHub Actions environment.

#![cfg(feature = "cli")]

use std::path::PathBuf;

use clap::Parser;

use crate::{
    config::{DEFAULT_BASELINE_WINDOW, DEFAULT_CONCURRENCY, RunOptions, parse_paths},
    env::{self, Env},
    error::Result,
    github::{
        RepoRef,
        client::{DEFAULT_API_URL, DEFAULT_MAX_RETRIES},
    },
};

/// Tags the pull requests that went into a GitHub Actions workflow run.
///
/// Every argument can also be given as an action input (`INPUT_<NAME>`).
#[derive(Debug, Default, Parser)]
#[command(version, about)]
pub struct Cli {
    /// The repository as `owner/name` [fallback: GITHUB_REPOSITORY]
    #[arg(long)]
    pub repository: Option<String>,

    /// The token used to talk to GitHub [fallback: GITHUB_TOKEN]
    #[arg(long = "access-token")]
    pub access_token: Option<String>,

    /// The workflow run whose pull requests are tagged [fallback: GITHUB_RUN_ID]
    #[arg(long = "workflow-run-id")]
    pub workflow_run_id: Option<u64>,

    /// The label to apply
    #[arg(long)]
    pub tag: Option<String>,

    /// Report what would be tagged without updating any pull request
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Comma or newline separated globs; only commits touching a match are tagged besides the head commit
    #[arg(long)]
    pub paths: Option<String>,

    /// How many recent successful runs are searched for the baseline
    #[arg(long = "baseline-window")]
    pub baseline_window: Option<u8>,

    /// How many commit lookups run concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// The GitHub REST API root [fallback: GITHUB_API_URL]
    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    /// How many times a request failing to connect is retried [fallback: MAX_RETRIES]
    #[arg(long = "max-retries")]
    pub max_retries: Option<u8>,

    /// Where the markdown summary is appended [fallback: GITHUB_STEP_SUMMARY]
    #[arg(long = "summary-file")]
    pub summary_file: Option<PathBuf>,
}

/// Everything the binary needs to run, resolved from arguments, inputs and environment.
#[derive(Clone)]
pub struct Config {
    /// The options handed to the pipeline.
    pub options: RunOptions,
    /// The token used to talk to GitHub.
    pub token: String,
    /// The GitHub REST API root.
    pub api_url: String,
    /// How many times a request failing to connect is retried.
    pub max_retries: u8,
    /// Where the markdown summary is appended. Printed to stdout if [`None`].
    pub summary_file: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("options", &self.options)
            .field("api_url", &self.api_url)
            .field("max_retries", &self.max_retries)
            .field("summary_file", &self.summary_file)
            .finish_non_exhaustive()
    }
}

impl Cli {
    /// Resolves the arguments, preferring flags over action inputs over fallback variables.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if a required value is missing or malformed.
    pub fn resolve<E>(self, env: &E) -> Result<Config>
    where
        E: Env + ?Sized,
    {
        let repo: RepoRef = match self.repository {
            Some(repository) => repository.parse()?,
            None => env::input_or_env(env, "repository", "GITHUB_REPOSITORY")?.parse()?,
        };
        let token = match self.access_token {
            Some(token) => token,
            None => env::input_or_env(env, "access-token", "GITHUB_TOKEN")?,
        };
        let run_id = match self.workflow_run_id {
            Some(run_id) => run_id,
            None => env::parse(
                "workflow-run-id",
                &env::input_or_env(env, "workflow-run-id", "GITHUB_RUN_ID")?,
            )?,
        };
        let tag = self
            .tag
            .or_else(|| env::input(env, "tag"))
            .unwrap_or_default();
        let dry_run = self.dry_run || env::input(env, "dry-run").as_deref() == Some("true");
        let paths = self
            .paths
            .or_else(|| env::input(env, "paths"))
            .map(|paths| parse_paths(&paths))
            .unwrap_or_default();
        let baseline_window = match self.baseline_window {
            Some(window) => window,
            None => env::input(env, "baseline-window")
                .map(|window| env::parse("baseline-window", &window))
                .transpose()?
                .unwrap_or(DEFAULT_BASELINE_WINDOW),
        };
        let concurrency = match self.concurrency {
            Some(concurrency) => concurrency,
            None => env::input(env, "concurrency")
                .map(|concurrency| env::parse("concurrency", &concurrency))
                .transpose()?
                .unwrap_or(DEFAULT_CONCURRENCY),
        };
        let max_retries = match self.max_retries {
            Some(max_retries) => max_retries,
            None => env
                .var("MAX_RETRIES")
                .map(|max_retries| env::parse("MAX_RETRIES", &max_retries))
                .transpose()?
                .unwrap_or(DEFAULT_MAX_RETRIES),
        };
        let api_url = self
            .api_url
            .or_else(|| env.var("GITHUB_API_URL"))
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        let summary_file = self.summary_file.or_else(|| {
            env.var("GITHUB_STEP_SUMMARY")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
        });

        let options = RunOptions {
            repo,
            run_id,
            tag,
            dry_run,
            paths,
            baseline_window,
            concurrency,
        };
        options.validate()?;

        Ok(Config {
            options,
            token,
            api_url,
            max_retries,
            summary_file,
        })
    }
}
