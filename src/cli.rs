use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use crate::analysis::filter::meaningful_runs;
use crate::analysis::stats::{build_run_stats, RunStats};
use crate::auth::Token;
use crate::cache::Cache;
use crate::providers::GitHubProvider;
use crate::report;

#[derive(Parser)]
#[command(name = "ciretro")]
#[command(author, version, about = "Historical CI run analysis and what-if modeling", long_about = None)]
pub struct Cli {
    /// GitHub repository in owner/name form
    #[arg(short, long)]
    repo: String,

    /// Workflow file path identifying the CI workflow
    #[arg(short, long, default_value = ".github/workflows/ci.yaml")]
    workflow: String,

    /// GitHub API token (optional, required for private repositories)
    #[arg(short, long, env = "GITHUB_TOKEN")]
    token: Option<String>,

    /// GitHub API base URL
    #[arg(short, long, default_value = "https://api.github.com")]
    api_url: String,

    /// Cap on number of newest runs to process; 0 or negative means no cap
    #[arg(short, long, default_value_t = 10)]
    limit: i64,

    /// Inclusive lower-bound date on run creation (YYYY-MM-DD)
    #[arg(short, long, default_value = "2025-06-01")]
    since: String,

    /// Path to the persisted run/PR cache
    #[arg(short, long, default_value = "ci-data.json")]
    cache_file: PathBuf,
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let mut cache = Cache::load(&self.cache_file)?;
        info!("Cache has {} runs, {} PRs", cache.runs.len(), cache.prs.len());

        let provider = GitHubProvider::new(
            &self.api_url,
            self.repo.clone(),
            self.token.as_deref().map(Token::from),
        )?;
        let run_ids = provider
            .sync_cache(
                &mut cache,
                &self.cache_file,
                &self.workflow,
                &self.since,
                self.limit,
            )
            .await?;

        let branch_to_pr = cache.branch_index();
        let meaningful = meaningful_runs(&cache, &run_ids, &branch_to_pr);
        info!(
            "{} meaningful runs out of {} total",
            meaningful.len(),
            run_ids.len()
        );

        let stats: Vec<RunStats> = meaningful.iter().filter_map(|r| build_run_stats(r)).collect();

        report::render(&self.since, &meaningful, &stats, &branch_to_pr);

        Ok(())
    }
}
