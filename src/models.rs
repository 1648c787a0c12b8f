use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::duration_sec;

/// Name of the workflow job whose steps are analyzed. Other jobs are
/// retained in the cache but never inspected.
pub const CI_JOB_NAME: &str = "ci";

/// Timeline event type marking a pull request's draft-to-ready transition.
pub const READY_FOR_REVIEW: &str = "ready_for_review";

/// A single step inside a workflow job, as reported by the CI API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub conclusion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    /// Elapsed seconds, when both timestamps are present.
    pub fn duration_sec(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(duration_sec(start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub conclusion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Job {
    pub fn duration_sec(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(duration_sec(start, end)),
            _ => None,
        }
    }
}

/// One completed workflow run. Immutable historical record keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub head_branch: String,
    pub conclusion: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub run_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl WorkflowRun {
    pub fn ci_job(&self) -> Option<&Job> {
        self.jobs.iter().find(|j| j.name == CI_JOB_NAME)
    }

    pub fn passed(&self) -> bool {
        self.conclusion.as_deref() == Some("success")
    }

    pub fn cancelled(&self) -> bool {
        self.conclusion.as_deref() == Some("cancelled")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub event: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head_ref: String,
    pub state: String,
    pub draft: bool,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timeline_events: Vec<TimelineEvent>,
}

impl PullRequest {
    /// Timestamp at which this PR became ready for review.
    ///
    /// The earliest `ready_for_review` timeline event wins; a PR that was
    /// never draft falls back to its creation time. A PR that is still
    /// draft with no observed transition has no undraft time.
    pub fn undraft_time(&self) -> Option<DateTime<Utc>> {
        let ready = self
            .timeline_events
            .iter()
            .filter(|e| e.event == READY_FOR_REVIEW)
            .map(|e| e.created_at)
            .min();
        if ready.is_some() {
            return ready;
        }
        if !self.draft {
            return Some(self.created_at);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn pr(draft: bool, events: Vec<TimelineEvent>) -> PullRequest {
        PullRequest {
            number: 7,
            head_ref: "feature-x".to_string(),
            state: "open".to_string(),
            draft,
            created_at: ts(1, 0),
            merged_at: None,
            timeline_events: events,
        }
    }

    #[test]
    fn test_undraft_time_uses_earliest_ready_event() {
        let pr = pr(
            true,
            vec![
                TimelineEvent {
                    event: READY_FOR_REVIEW.to_string(),
                    created_at: ts(3, 0),
                },
                TimelineEvent {
                    event: READY_FOR_REVIEW.to_string(),
                    created_at: ts(2, 0),
                },
            ],
        );

        assert_eq!(pr.undraft_time(), Some(ts(2, 0)));
    }

    #[test]
    fn test_undraft_time_falls_back_to_creation_when_never_draft() {
        let pr = pr(false, vec![]);

        assert_eq!(pr.undraft_time(), Some(ts(1, 0)));
    }

    #[test]
    fn test_undraft_time_undefined_for_still_draft_pr() {
        let pr = pr(true, vec![]);

        assert_eq!(pr.undraft_time(), None);
    }

    #[test]
    fn test_undraft_time_ignores_other_event_types() {
        let pr = pr(
            true,
            vec![TimelineEvent {
                event: "labeled".to_string(),
                created_at: ts(2, 0),
            }],
        );

        assert_eq!(pr.undraft_time(), None);
    }

    #[test]
    fn test_ci_job_lookup_by_name() {
        let run = WorkflowRun {
            id: 1,
            head_branch: "feature-x".to_string(),
            conclusion: Some("success".to_string()),
            status: "completed".to_string(),
            created_at: ts(1, 0),
            updated_at: None,
            run_started_at: None,
            jobs: vec![
                Job {
                    id: 10,
                    name: "deploy".to_string(),
                    conclusion: None,
                    started_at: None,
                    completed_at: None,
                    steps: vec![],
                },
                Job {
                    id: 11,
                    name: "ci".to_string(),
                    conclusion: Some("success".to_string()),
                    started_at: None,
                    completed_at: None,
                    steps: vec![],
                },
            ],
        };

        assert_eq!(run.ci_job().map(|j| j.id), Some(11));
    }
}
