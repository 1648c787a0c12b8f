use std::collections::HashMap;

use crate::cache::Cache;
use crate::models::{PullRequest, WorkflowRun};

/// Branches whose runs are never developer-facing PR feedback.
pub const TRUNK_BRANCHES: [&str; 2] = ["master", "main"];

/// Runs where every `ci` step finishes faster than this are treated as
/// trivial/no-op executions and excluded.
const TRIVIAL_STEP_SECS: f64 = 5.0;

pub fn is_trunk_branch(branch: &str) -> bool {
    TRUNK_BRANCHES.contains(&branch)
}

/// Select the runs that count as real developer-facing CI executions.
///
/// The dataset is expected to be noisy (force-pushes, deleted branches,
/// bot-triggered runs), so missing correlation data excludes a run
/// rather than erroring.
pub fn meaningful_runs<'a>(
    cache: &'a Cache,
    run_ids: &[u64],
    branch_to_pr: &HashMap<&str, &PullRequest>,
) -> Vec<&'a WorkflowRun> {
    run_ids
        .iter()
        .filter_map(|id| cache.runs.get(id))
        .filter(|run| is_meaningful(run, branch_to_pr))
        .collect()
}

fn is_meaningful(run: &WorkflowRun, branch_to_pr: &HashMap<&str, &PullRequest>) -> bool {
    if is_trunk_branch(&run.head_branch) {
        return false;
    }
    if run.cancelled() {
        return false;
    }

    let Some(pr) = branch_to_pr.get(run.head_branch.as_str()) else {
        return false;
    };

    // The PR must have been open and non-draft when the run executed.
    // Compare against the inferred undraft time, not the current draft
    // flag: draft status at analysis time can differ from status at run
    // time.
    let Some(undraft_time) = pr.undraft_time() else {
        return false;
    };
    if run.created_at < undraft_time {
        return false;
    }

    // Guard against no-op executions: every timed step under 5s. When
    // the ci job is absent the check is skipped and the run kept.
    if let Some(job) = run.ci_job() {
        let all_trivial = job
            .steps
            .iter()
            .all(|s| s.duration_sec().is_none_or(|secs| secs < TRIVIAL_STEP_SECS));
        if all_trivial {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::models::{Job, Step, TimelineEvent, READY_FOR_REVIEW};

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn real_step(start_hour: u32) -> Step {
        Step {
            name: "Build packages".to_string(),
            conclusion: Some("success".to_string()),
            started_at: Some(ts(10, start_hour)),
            completed_at: Some(ts(10, start_hour + 1)),
        }
    }

    fn run(id: u64, branch: &str, created: DateTime<Utc>) -> WorkflowRun {
        WorkflowRun {
            id,
            head_branch: branch.to_string(),
            conclusion: Some("success".to_string()),
            status: "completed".to_string(),
            created_at: created,
            updated_at: None,
            run_started_at: None,
            jobs: vec![Job {
                id: 1,
                name: "ci".to_string(),
                conclusion: Some("success".to_string()),
                started_at: Some(ts(10, 0)),
                completed_at: Some(ts(10, 2)),
                steps: vec![real_step(0)],
            }],
        }
    }

    fn pr(branch: &str, ready_at: DateTime<Utc>) -> PullRequest {
        PullRequest {
            number: 7,
            head_ref: branch.to_string(),
            state: "open".to_string(),
            draft: true,
            created_at: ts(1, 0),
            merged_at: None,
            timeline_events: vec![TimelineEvent {
                event: READY_FOR_REVIEW.to_string(),
                created_at: ready_at,
            }],
        }
    }

    fn filter_one(run: WorkflowRun, pr: Option<PullRequest>) -> usize {
        let mut cache = Cache::default();
        let id = run.id;
        cache.insert_run(run);
        if let Some(pr) = pr {
            cache.insert_pr(pr);
        }
        let index = cache.branch_index();
        meaningful_runs(&cache, &[id], &index).len()
    }

    #[test]
    fn test_run_after_undraft_is_meaningful() {
        let kept = filter_one(run(1, "feature-x", ts(10, 0)), Some(pr("feature-x", ts(5, 0))));
        assert_eq!(kept, 1);
    }

    #[test]
    fn test_run_before_undraft_is_excluded() {
        let kept = filter_one(run(1, "feature-x", ts(3, 0)), Some(pr("feature-x", ts(5, 0))));
        assert_eq!(kept, 0);
    }

    #[test]
    fn test_trunk_branch_runs_are_excluded() {
        for trunk in ["master", "main"] {
            let kept = filter_one(run(1, trunk, ts(10, 0)), Some(pr(trunk, ts(5, 0))));
            assert_eq!(kept, 0);
        }
    }

    #[test]
    fn test_cancelled_runs_are_excluded() {
        let mut cancelled = run(1, "feature-x", ts(10, 0));
        cancelled.conclusion = Some("cancelled".to_string());
        let kept = filter_one(cancelled, Some(pr("feature-x", ts(5, 0))));
        assert_eq!(kept, 0);
    }

    #[test]
    fn test_run_without_pr_is_excluded() {
        let kept = filter_one(run(1, "feature-x", ts(10, 0)), None);
        assert_eq!(kept, 0);
    }

    #[test]
    fn test_run_on_still_draft_pr_is_excluded() {
        let mut draft_pr = pr("feature-x", ts(5, 0));
        draft_pr.timeline_events.clear();
        let kept = filter_one(run(1, "feature-x", ts(10, 0)), Some(draft_pr));
        assert_eq!(kept, 0);
    }

    #[test]
    fn test_all_trivial_steps_excluded() {
        let mut trivial = run(1, "feature-x", ts(10, 0));
        trivial.jobs[0].steps = vec![Step {
            name: "Build packages".to_string(),
            conclusion: Some("success".to_string()),
            started_at: Some(ts(10, 0)),
            completed_at: Some(ts(10, 0) + chrono::Duration::seconds(2)),
        }];
        let kept = filter_one(trivial, Some(pr("feature-x", ts(5, 0))));
        assert_eq!(kept, 0);
    }

    #[test]
    fn test_run_without_ci_job_skips_trivial_check() {
        let mut no_ci = run(1, "feature-x", ts(10, 0));
        no_ci.jobs[0].name = "deploy".to_string();
        let kept = filter_one(no_ci, Some(pr("feature-x", ts(5, 0))));
        assert_eq!(kept, 1);
    }

    #[test]
    fn test_runs_filter_independently() {
        // Removing one run from the id list leaves the other untouched.
        let mut cache = Cache::default();
        cache.insert_run(run(1, "feature-x", ts(10, 0)));
        cache.insert_run(run(2, "feature-x", ts(11, 0)));
        cache.insert_pr(pr("feature-x", ts(5, 0)));
        let index = cache.branch_index();

        let both = meaningful_runs(&cache, &[1, 2], &index);
        let only_second = meaningful_runs(&cache, &[2], &index);

        assert_eq!(both.len(), 2);
        assert_eq!(only_second.len(), 1);
        assert_eq!(only_second[0].id, both[1].id);
    }
}
