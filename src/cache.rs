use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{PullRequest, WorkflowRun};

/// Previously-fetched run and pull-request data.
///
/// Merge semantics are append-only: a run or PR already present is never
/// overwritten, so repeated invocations resume where the last fetch
/// stopped instead of re-downloading history.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Cache {
    pub runs: BTreeMap<u64, WorkflowRun>,
    pub prs: Vec<PullRequest>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Cache {
    /// Load the cache from disk; a missing file yields an empty cache.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist the current state, refreshing `fetched_at`. Safe to call
    /// repeatedly mid-fetch so partial progress survives an interruption.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.fetched_at = Some(Utc::now());
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Insert a run only if its id is not already cached. Returns whether
    /// the run was inserted.
    pub fn insert_run(&mut self, run: WorkflowRun) -> bool {
        if self.runs.contains_key(&run.id) {
            return false;
        }
        self.runs.insert(run.id, run);
        true
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.prs.iter().any(|pr| pr.head_ref == branch)
    }

    /// Append a PR only if its head branch is not already represented.
    /// Returns whether the PR was appended.
    pub fn insert_pr(&mut self, pr: PullRequest) -> bool {
        if self.has_branch(&pr.head_ref) {
            return false;
        }
        self.prs.push(pr);
        true
    }

    /// Index PRs by head branch. When a branch has multiple cached PRs
    /// the last one wins.
    pub fn branch_index(&self) -> HashMap<&str, &PullRequest> {
        let mut index = HashMap::new();
        for pr in &self.prs {
            index.insert(pr.head_ref.as_str(), pr);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run(id: u64, branch: &str) -> WorkflowRun {
        WorkflowRun {
            id,
            head_branch: branch.to_string(),
            conclusion: Some("success".to_string()),
            status: "completed".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            updated_at: None,
            run_started_at: None,
            jobs: vec![],
        }
    }

    fn pr(number: u64, branch: &str) -> PullRequest {
        PullRequest {
            number,
            head_ref: branch.to_string(),
            state: "open".to_string(),
            draft: false,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            merged_at: None,
            timeline_events: vec![],
        }
    }

    #[test]
    fn test_insert_run_is_append_only() {
        let mut cache = Cache::default();
        assert!(cache.insert_run(run(42, "feature-a")));

        // A refetched run with the same id must not replace the original.
        assert!(!cache.insert_run(run(42, "feature-b")));
        assert_eq!(cache.runs[&42].head_branch, "feature-a");
    }

    #[test]
    fn test_insert_pr_deduplicates_by_branch() {
        let mut cache = Cache::default();
        assert!(cache.insert_pr(pr(1, "feature-a")));
        assert!(!cache.insert_pr(pr(2, "feature-a")));
        assert!(cache.insert_pr(pr(3, "feature-b")));

        assert_eq!(cache.prs.len(), 2);
    }

    #[test]
    fn test_load_missing_file_yields_empty_cache() {
        let path = std::env::temp_dir().join("ciretro-no-such-cache.json");
        let cache = Cache::load(&path).unwrap();

        assert!(cache.runs.is_empty());
        assert!(cache.prs.is_empty());
        assert!(cache.fetched_at.is_none());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let path = std::env::temp_dir().join(format!("ciretro-cache-{}.json", std::process::id()));
        let mut cache = Cache::default();
        cache.insert_run(run(7, "feature-a"));
        cache.insert_pr(pr(1, "feature-a"));
        cache.save(&path).unwrap();

        let reloaded = Cache::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(reloaded.runs.len(), 1);
        assert_eq!(reloaded.prs.len(), 1);
        assert!(reloaded.fetched_at.is_some());
    }

    #[test]
    fn test_branch_index_last_pr_wins() {
        let mut cache = Cache::default();
        cache.prs.push(pr(1, "feature-a"));
        cache.prs.push(pr(2, "feature-a"));

        let index = cache.branch_index();
        assert_eq!(index["feature-a"].number, 2);
    }
}
