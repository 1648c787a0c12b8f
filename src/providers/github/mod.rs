mod client;

use std::collections::BTreeSet;
use std::path::Path;

use log::{info, warn};

use crate::auth::Token;
use crate::cache::Cache;
use crate::error::{CiRetroError, Result};
use crate::models::{PullRequest, WorkflowRun};

pub use client::GitHubClient;
use client::PullRequestDto;

/// Persist the cache after this many newly fetched runs so partial
/// progress survives an interrupted fetch.
const SAVE_EVERY: usize = 10;

pub struct GitHubProvider {
    client: GitHubClient,
    repo: String,
}

impl PullRequestDto {
    fn into_pull_request(self, timeline_events: Vec<crate::models::TimelineEvent>) -> PullRequest {
        PullRequest {
            number: self.number,
            head_ref: self.head.ref_,
            state: self.state,
            draft: self.draft,
            created_at: self.created_at,
            merged_at: self.merged_at,
            timeline_events,
        }
    }
}

impl GitHubProvider {
    pub fn new(api_url: &str, repo: String, token: Option<Token>) -> Result<Self> {
        let client = GitHubClient::new(api_url, token)?;
        Ok(Self { client, repo })
    }

    /// Fetch new run and PR data into the cache, saving periodically.
    ///
    /// Returns the list of run ids in scope for analysis: the newest
    /// `limit` runs when a positive cap is given, otherwise every
    /// cached run.
    pub async fn sync_cache(
        &self,
        cache: &mut Cache,
        cache_path: &Path,
        workflow_path: &str,
        since: &str,
        limit: i64,
    ) -> Result<Vec<u64>> {
        info!("Fetching CI workflow runs since {since}...");

        let workflows = self.client.fetch_workflows(&self.repo).await?;
        let workflow = workflows
            .iter()
            .find(|w| w.path == workflow_path)
            .ok_or_else(|| CiRetroError::Api(format!("CI workflow {workflow_path} not found")))?;
        info!("CI workflow ID: {}", workflow.id);

        let all_runs = self
            .client
            .fetch_workflow_runs(&self.repo, workflow.id, since)
            .await?;
        info!("Found {} completed runs total", all_runs.len());

        let runs: Vec<WorkflowRun> = if limit > 0 {
            #[allow(clippy::cast_sign_loss)]
            let cap = limit as usize;
            all_runs.into_iter().take(cap).collect()
        } else {
            all_runs
        };
        info!("Processing {} runs", runs.len());

        let listed_ids: Vec<u64> = runs.iter().map(|r| r.id).collect();
        self.fetch_missing_jobs(cache, cache_path, runs).await?;

        let run_ids: Vec<u64> = if limit > 0 {
            listed_ids
        } else {
            cache.runs.keys().copied().collect()
        };
        self.fetch_missing_prs(cache, cache_path, &run_ids).await?;

        Ok(run_ids)
    }

    /// Fetch jobs for runs not yet in the cache.
    async fn fetch_missing_jobs(
        &self,
        cache: &mut Cache,
        cache_path: &Path,
        runs: Vec<WorkflowRun>,
    ) -> Result<()> {
        let mut fetched = 0usize;
        for mut run in runs {
            if cache.runs.contains_key(&run.id) {
                continue;
            }
            run.jobs = self.client.fetch_run_jobs(&self.repo, run.id).await?;
            cache.insert_run(run);
            fetched += 1;
            if fetched % SAVE_EVERY == 0 {
                info!("  Fetched jobs for {fetched} runs...");
                cache.save(cache_path)?;
            }
        }
        if fetched > 0 {
            info!("Fetched jobs for {fetched} new runs");
            cache.save(cache_path)?;
        }
        Ok(())
    }

    /// Fetch PRs and their timelines for branches that have runs in
    /// scope but no cached PR yet.
    async fn fetch_missing_prs(
        &self,
        cache: &mut Cache,
        cache_path: &Path,
        run_ids: &[u64],
    ) -> Result<()> {
        let branches_needed: BTreeSet<String> = run_ids
            .iter()
            .filter_map(|id| cache.runs.get(id))
            .map(|r| r.head_branch.clone())
            .filter(|b| !crate::analysis::filter::is_trunk_branch(b))
            .collect();
        let missing: Vec<String> = branches_needed
            .into_iter()
            .filter(|b| !cache.has_branch(b))
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        info!("Fetching PRs for {} branches...", missing.len());
        for branch in &missing {
            // A branch may have no PR (force-pushed, deleted, bot runs).
            let prs = match self.client.fetch_branch_prs(&self.repo, branch).await {
                Ok(prs) => prs,
                Err(e) => {
                    warn!("No PR data for branch {branch}: {e}");
                    continue;
                }
            };
            for dto in prs {
                // The timeline API can fail independently; an empty
                // timeline just means no observed undraft transition.
                let timeline = match self.client.fetch_pr_timeline(&self.repo, dto.number).await {
                    Ok(events) => events,
                    Err(e) => {
                        warn!("Timeline fetch failed for PR #{}: {e}", dto.number);
                        Vec::new()
                    }
                };
                cache.insert_pr(dto.into_pull_request(timeline));
            }
        }
        cache.save(cache_path)?;
        info!("Cache now has {} PRs", cache.prs.len());
        Ok(())
    }
}
