use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::auth::Token;
use crate::error::{CiRetroError, Result};
use crate::models::{Job, TimelineEvent, WorkflowRun, READY_FOR_REVIEW};

const PER_PAGE: usize = 100;

pub struct GitHubClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
}

#[derive(Debug, Deserialize)]
pub struct Workflow {
    pub id: u64,
    pub path: String,
}

#[derive(Debug, Deserialize)]
struct WorkflowList {
    workflows: Vec<Workflow>,
}

/// Pull request as returned by the pulls endpoint; the head branch is
/// nested and timeline events arrive from a separate endpoint.
#[derive(Debug, Deserialize)]
pub struct PullRequestDto {
    pub number: u64,
    pub head: PrHead,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub merged_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PrHead {
    #[serde(rename = "ref")]
    pub ref_: String,
}

/// Timeline events are heterogeneous; most types lack fields we read.
#[derive(Debug, Deserialize)]
struct TimelineEventDto {
    event: Option<String>,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One page of a paginated listing. List endpoints either return a bare
/// array or wrap it in an envelope named after the resource.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Page<T> {
    Runs { workflow_runs: Vec<T> },
    Jobs { jobs: Vec<T> },
    Plain(Vec<T>),
}

impl<T> Page<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Runs { workflow_runs } => workflow_runs,
            Self::Jobs { jobs } => jobs,
            Self::Plain(items) => items,
        }
    }
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("ciretro/0.1.0")
            .build()
            .map_err(|e| CiRetroError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| CiRetroError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// Helper to build authenticated requests
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    fn repo_url(&self, repo: &str, path: &str) -> Result<Url> {
        self.api_url
            .join(&format!("repos/{repo}/{path}"))
            .map_err(|e| CiRetroError::Config(format!("Invalid endpoint URL: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let request = self.auth_request(self.client.get(url));
        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    /// Fetch every page of a listing endpoint. Stops on the first page
    /// returning fewer than `per_page` items.
    async fn fetch_paginated<T: DeserializeOwned>(&self, base: Url) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut page = 1u32;
        loop {
            let mut url = base.clone();
            url.query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let items = self.get_json::<Page<T>>(url).await?.into_items();
            let count = items.len();
            results.extend(items);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(results)
    }

    /// List the repository's workflows (single request; repositories
    /// rarely have more than a page of workflows).
    pub async fn fetch_workflows(&self, repo: &str) -> Result<Vec<Workflow>> {
        let url = self.repo_url(repo, "actions/workflows")?;
        let list = self.get_json::<WorkflowList>(url).await?;
        Ok(list.workflows)
    }

    /// List completed runs of a workflow created on or after `since`
    /// (inclusive date lower bound), newest first.
    pub async fn fetch_workflow_runs(
        &self,
        repo: &str,
        workflow_id: u64,
        since: &str,
    ) -> Result<Vec<WorkflowRun>> {
        let mut url = self.repo_url(repo, &format!("actions/workflows/{workflow_id}/runs"))?;
        url.query_pairs_mut()
            .append_pair("created", &format!(">={since}"))
            .append_pair("status", "completed");
        self.fetch_paginated(url).await
    }

    /// List all jobs (with steps) of one run.
    pub async fn fetch_run_jobs(&self, repo: &str, run_id: u64) -> Result<Vec<Job>> {
        let url = self.repo_url(repo, &format!("actions/runs/{run_id}/jobs"))?;
        self.fetch_paginated(url).await
    }

    /// List pull requests whose head branch matches, in any state.
    pub async fn fetch_branch_prs(&self, repo: &str, branch: &str) -> Result<Vec<PullRequestDto>> {
        let owner = repo.split('/').next().unwrap_or(repo);
        let mut url = self.repo_url(repo, "pulls")?;
        url.query_pairs_mut()
            .append_pair("state", "all")
            .append_pair("head", &format!("{owner}:{branch}"));
        self.fetch_paginated(url).await
    }

    /// Fetch a PR's issue timeline, keeping only ready-for-review
    /// transitions.
    pub async fn fetch_pr_timeline(&self, repo: &str, number: u64) -> Result<Vec<TimelineEvent>> {
        let url = self.repo_url(repo, &format!("issues/{number}/timeline"))?;
        let events: Vec<TimelineEventDto> = self.fetch_paginated(url).await?;
        Ok(events
            .into_iter()
            .filter_map(|e| match (e.event, e.created_at) {
                (Some(event), Some(created_at)) if event == READY_FOR_REVIEW => {
                    Some(TimelineEvent { event, created_at })
                }
                _ => None,
            })
            .collect())
    }
}
