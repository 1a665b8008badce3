//! Paginated retrieval of workflow data from the GitHub REST API.
//!
//! The client isolates all network handling. It performs no implicit
//! retries; retry policy belongs to the orchestrator.

use async_trait::async_trait;
use reqwest::{RequestBuilder, header};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::{
    env::Config,
    error::Error,
    validate,
    workflow::{RepoId, Workflow, WorkflowRun},
};

/// The page size of workflow and run listings. Run histories are capped at
/// one page of the most recent runs.
const PER_PAGE: usize = 100;
/// The fixed client identifier sent with every request.
const USER_AGENT: &str = "actions-health/0.1";
const API_VERSION: &str = "2022-11-28";
const BASE_URL: &str = "https://api.github.com";

/// Supplies workflow definitions and run histories for a repository.
///
/// The orchestrator consumes this interface, so tests can swap the live
/// client for a deterministic stub.
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    /// Fetches every workflow defined in the repository, in listing order.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Upstream`] on a non-2xx response and with
    /// [`Error::Schema`] if a payload cannot be validated.
    async fn fetch_workflows(&self, repo: &RepoId) -> Result<Vec<Workflow>, Error>;

    /// Fetches the most recent runs of one workflow, newest first.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`WorkflowSource::fetch_workflows`].
    async fn fetch_workflow_runs(
        &self,
        repo: &RepoId,
        workflow_id: u64,
    ) -> Result<Vec<WorkflowRun>, Error>;
}

/// A [`WorkflowSource`] backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    token: String,
}

impl GithubClient {
    /// Creates a client holding the credential from the process
    /// configuration. Nothing is read from the environment here.
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: config.github_token.clone(),
        }
    }

    /// Builds a request for the GitHub REST API.
    fn request(&self, url: &str) -> RequestBuilder {
        self.http
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.token)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, Error> {
        debug!("fetching {url}…");
        let response = self.request(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = upstream_message(response).await;
            error!("upstream responded {status} for {url}: {message}");
            return Err(Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Extracts the upstream `message` from an error body, marking exhausted
/// rate limits so the orchestrator can tell them apart.
async fn upstream_message(response: reqwest::Response) -> String {
    let exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .is_some_and(|remaining| remaining.as_bytes() == b"0");
    let status = response.status();
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .or_else(|| status.canonical_reason().map(str::to_owned))
        .unwrap_or_else(|| status.to_string());
    if exhausted && !message.contains("rate limit") {
        format!("rate limit exhausted: {message}")
    } else {
        message
    }
}

#[async_trait]
impl WorkflowSource for GithubClient {
    async fn fetch_workflows(&self, repo: &RepoId) -> Result<Vec<Workflow>, Error> {
        let mut workflows: Vec<Workflow> = Vec::new();
        for page in 1.. {
            let url = format!(
                "{BASE_URL}/repos/{repo}/actions/workflows?per_page={PER_PAGE}&page={page}"
            );
            let payload = self.fetch_json(&url).await?;
            let (total_count, mut chunk) = validate::workflow_list(&payload).map_err(|err| {
                error!("invalid workflow payload from {url}: {err}");
                err
            })?;
            let fetched = chunk.len();
            workflows.append(&mut chunk);
            if fetched < PER_PAGE || workflows.len() as u64 >= total_count {
                break;
            }
        }
        info!("fetched {} workflows from {repo}", workflows.len());
        Ok(workflows)
    }

    async fn fetch_workflow_runs(
        &self,
        repo: &RepoId,
        workflow_id: u64,
    ) -> Result<Vec<WorkflowRun>, Error> {
        let url = format!(
            "{BASE_URL}/repos/{repo}/actions/workflows/{workflow_id}/runs?per_page={PER_PAGE}"
        );
        let payload = self.fetch_json(&url).await?;
        let mut runs = validate::run_list(&payload).map_err(|err| {
            error!("invalid run payload from {url}: {err}");
            err
        })?;
        // the upstream API does not guarantee chronological order
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        info!("fetched {} runs for workflow {workflow_id} of {repo}", runs.len());
        Ok(runs)
    }
}
