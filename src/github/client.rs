//! A [`GitHubApi`] backed by GitHub REST API.

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, error, warn};

use crate::{
    error::{Error, Result},
    github::{
        GitHubApi, RepoRef,
        models::{
            CommitDetail, Comparison, LabelUpdate, PullRequest, Repository, WorkflowRun,
            WorkflowRuns,
        },
    },
};

/// The public GitHub REST API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// The retry limit used when none is configured.
pub const DEFAULT_MAX_RETRIES: u8 = 2;

/// The largest page GitHub serves for paginated lists.
const PAGE_SIZE: u8 = 100;

const USER_AGENT: &str = concat!("workflow-pr-tagger/", env!("CARGO_PKG_VERSION"));

/// The error body GitHub attaches to non-success responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// A GitHub REST API client.
///
/// Requests failing to connect or timing out are retried up to the configured
/// limit. Every other failure is handed to the caller.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_retries: u8,
}

impl Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Creates a client for the public GitHub REST API.
    pub fn new<T>(token: T) -> Self
    where
        T: Into<String>,
    {
        Self::with_base_url(token, DEFAULT_API_URL)
    }

    /// Creates a client for a GitHub REST API served at `base_url`, such as a GitHub Enterprise Server.
    pub fn with_base_url<T, U>(token: T, base_url: U) -> Self
    where
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets how many times a request failing to connect or timing out is retried.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Builds a request for GitHub REST API.
    fn request_builder(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.token)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header(header::USER_AGENT, USER_AGENT)
    }

    fn url(&self, repo: &RepoRef, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{path}",
            self.base_url, repo.owner, repo.name
        )
    }

    /// Sends a request, retrying connection failures and timeouts.
    async fn send<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut retry: u8 = 0;
        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_connect() || err.is_timeout() => {
                    error!("failed to reach {url}: {err}");
                    if retry_if_possible(&mut retry, self.max_retries).is_err() {
                        return Err(err.into());
                    }
                }
                Err(err) => {
                    error!("failed to request {url}: {err}");
                    return Err(err.into());
                }
            }
        }
    }

    async fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let (body, _) = self.get_page(url, query).await?;
        Ok(body)
    }

    /// Fetches one page, returning its body and the URL of the next page, if any.
    async fn get_page<T>(&self, url: &str, query: &[(&str, String)]) -> Result<(T, Option<String>)>
    where
        T: DeserializeOwned,
    {
        debug!("requesting {url}…");
        let response = self
            .send(url, || self.request_builder(Method::GET, url).query(query))
            .await?;
        let response = check_status(url, response).await?;
        let next = next_page(response.headers());

        let body = response.json::<T>().await.map_err(|err| {
            error!("failed to parse data from {url}: {err}");
            Error::Transient(format!("undecodable response from {url}: {err}"))
        })?;
        Ok((body, next))
    }

    /// Fetches every page starting at `url`, following `Link: <…>; rel="next"`.
    ///
    /// `query` only applies to the first request; the next page links already carry it.
    async fn get_all_pages<T, I, F>(
        &self,
        url: &str,
        query: &[(&str, String)],
        mut items: F,
    ) -> Result<Vec<I>>
    where
        T: DeserializeOwned + Send,
        F: FnMut(T) -> Vec<I> + Send,
        I: Send,
    {
        let (first, mut next) = self.get_page(url, query).await?;
        let mut collected = items(first);
        while let Some(page_url) = next {
            let (page, following) = self.get_page(&page_url, &[]).await?;
            collected.extend(items(page));
            next = following;
        }
        Ok(collected)
    }
}

/// Extracts the `rel="next"` target of a `Link` header.
fn next_page(headers: &header::HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        parts
            .any(|param| param.trim() == r#"rel="next""#)
            .then(|| target.trim_start_matches('<').trim_end_matches('>').to_owned())
    })
}

/// Decides whether retrying is allowed based on the retries done so far and the limit.
///
/// # Errors
///
/// Returns [`Err<()>`] if retrying is not allowed, otherwise [`Ok<()>`] is returned.
fn retry_if_possible(retry: &mut u8, max_retries: u8) -> Result<(), ()> {
    if *retry >= max_retries {
        error!("retried for too many times ({max_retries}), stopping!");
        Err(())
    } else {
        *retry += 1;
        warn!("retrying… ({retry} / {max_retries})");
        Ok(())
    }
}

/// Maps a non-success response onto the error taxonomy.
async fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = error_message(response).await;
    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(url.to_owned()),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            Error::Transient(format!("{url} answered {status}: {message}"))
        }
        status if status.is_server_error() => {
            Error::Transient(format!("{url} answered {status}: {message}"))
        }
        status => Error::Rejected {
            url: url.to_owned(),
            status: status.as_u16(),
            message,
        },
    })
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().unwrap_or_default().to_owned(),
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn get_workflow_run(&self, repo: &RepoRef, run_id: u64) -> Result<WorkflowRun> {
        let url = self.url(repo, &format!("/actions/runs/{run_id}"));
        self.get_json(&url, &[]).await
    }

    async fn get_repository(&self, repo: &RepoRef) -> Result<Repository> {
        let url = self.url(repo, "");
        self.get_json(&url, &[]).await
    }

    async fn list_successful_workflow_runs(
        &self,
        repo: &RepoRef,
        workflow_id: u64,
        branch: &str,
        per_page: u8,
    ) -> Result<Vec<WorkflowRun>> {
        let url = self.url(repo, &format!("/actions/workflows/{workflow_id}/runs"));
        let query = [
            ("branch", branch.to_owned()),
            ("status", "success".to_owned()),
            ("per_page", per_page.to_string()),
        ];
        let runs: WorkflowRuns = self.get_json(&url, &query).await?;
        Ok(runs.workflow_runs)
    }

    async fn compare_commits(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
    ) -> Result<Vec<String>> {
        let url = self.url(repo, &format!("/compare/{base}...{head}"));
        let query = [("per_page", PAGE_SIZE.to_string())];
        self.get_all_pages(&url, &query, |comparison: Comparison| -> Vec<String> {
            comparison
                .commits
                .into_iter()
                .map(|commit| commit.sha)
                .collect()
        })
        .await
    }

    async fn get_commit_files(&self, repo: &RepoRef, sha: &str) -> Result<Vec<String>> {
        let url = self.url(repo, &format!("/commits/{sha}"));
        let query = [("per_page", PAGE_SIZE.to_string())];
        self.get_all_pages(&url, &query, |commit: CommitDetail| -> Vec<String> {
            commit.files.into_iter().map(|file| file.filename).collect()
        })
        .await
    }

    async fn list_pull_requests_for_commit(
        &self,
        repo: &RepoRef,
        sha: &str,
    ) -> Result<Vec<PullRequest>> {
        let url = self.url(repo, &format!("/commits/{sha}/pulls"));
        self.get_json(&url, &[]).await
    }

    async fn update_issue_labels(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        labels: &[String],
    ) -> Result<LabelUpdate> {
        let url = self.url(repo, &format!("/issues/{issue_number}"));
        let body = serde_json::json!({ "labels": labels });
        debug!("updating labels of {url}…");

        let response = self
            .send(&url, || {
                self.request_builder(Method::PATCH, &url).json(&body)
            })
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(LabelUpdate {
                status: status.as_u16(),
                reason: None,
            })
        } else {
            Ok(LabelUpdate {
                status: status.as_u16(),
                reason: Some(error_message(response).await),
            })
        }
    }
}
