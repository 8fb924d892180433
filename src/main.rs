use std::{path::Path, process::ExitCode};

use anyhow::{Context as _, Result};
use clap::Parser as _;
use tokio::io::AsyncWriteExt as _;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use workflow_pr_tagger::{
    GitHubClient,
    cli::{Cli, Config},
    env::ProcessEnv,
    pipeline::{self, RunSummary},
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match execute(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:?}");
            // Surfaces the failure as an annotation when running inside GitHub Actions.
            println!("::error::{}", escape_workflow_command(&format!("{err:#}")));
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = cli.resolve(&ProcessEnv)?;
    let client = GitHubClient::with_base_url(&config.token, &config.api_url)
        .max_retries(config.max_retries);

    info!(
        "tagging pull requests of run {} in {}…",
        config.options.run_id, config.options.repo
    );
    let summary = pipeline::run(&client, &config.options)
        .await
        .with_context(|| format!("failed to tag run {}", config.options.run_id))?;

    for outcome in &summary.outcomes {
        info!("{}: {}", outcome.sha, outcome.outcome);
    }
    write_summary(&config, &summary).await
}

async fn write_summary(config: &Config, summary: &RunSummary) -> Result<()> {
    let markdown = summary.report.to_markdown(&config.options.tag);
    match &config.summary_file {
        Some(path) => append(path, &markdown)
            .await
            .with_context(|| format!("failed to write the run summary to {}", path.display())),
        None => {
            print!("{markdown}");
            Ok(())
        }
    }
}

async fn append(path: &Path, markdown: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(markdown.as_bytes()).await?;
    file.flush().await
}

/// Escapes the characters GitHub Actions treats specially in workflow command messages.
fn escape_workflow_command(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
