use indexmap::IndexMap;

use crate::analysis::categorize::{categorize_step, StepCategory};
use crate::duration::duration_sec;
use crate::models::{Job, WorkflowRun};

/// Normalized per-run statistics record; the unit of all aggregation and
/// simulation downstream. Recomputed from the cache on every pass.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub id: u64,
    /// Calendar month of the run's creation, `YYYY-MM`.
    pub month: String,
    pub passed: bool,
    /// Wall-clock span of the `ci` job in seconds.
    pub total_duration: f64,
    pub category_durations: IndexMap<StepCategory, f64>,
    /// Category of the last step that concluded with `failure`. Later
    /// failing steps override earlier ones; the terminal failure is the
    /// most informative when a pipeline reports several.
    pub failed_category: Option<StepCategory>,
    /// Seconds from job start to the failing step's completion; 0 for
    /// passing runs.
    pub time_to_failure: f64,
}

impl RunStats {
    pub fn category_duration(&self, category: StepCategory) -> f64 {
        self.category_durations.get(&category).copied().unwrap_or(0.0)
    }
}

/// Sum step durations into category buckets. Steps missing either
/// timestamp contribute nothing.
pub fn job_category_durations(job: &Job) -> IndexMap<StepCategory, f64> {
    let mut durations = IndexMap::new();
    for step in &job.steps {
        if let Some(secs) = step.duration_sec() {
            *durations.entry(categorize_step(&step.name)).or_insert(0.0) += secs;
        }
    }
    durations
}

/// Category of the last failing step in step order, if any.
pub fn last_failed_category(job: &Job) -> Option<StepCategory> {
    job.steps
        .iter()
        .filter(|s| s.conclusion.as_deref() == Some("failure"))
        .last()
        .map(|s| categorize_step(&s.name))
}

/// Build the statistics record for one meaningful run.
///
/// Returns `None` when the run has no `ci` job or that job lacks a start
/// or completion time; such runs are dropped from statistics silently.
pub fn build_run_stats(run: &WorkflowRun) -> Option<RunStats> {
    let job = run.ci_job()?;
    let job_start = job.started_at?;
    let job_end = job.completed_at?;

    let mut category_durations = IndexMap::new();
    let mut failed_category = None;
    let mut time_to_failure = 0.0;

    for step in &job.steps {
        let category = categorize_step(&step.name);
        if let Some(secs) = step.duration_sec() {
            *category_durations.entry(category).or_insert(0.0) += secs;
        }
        if step.conclusion.as_deref() == Some("failure") {
            if let Some(completed) = step.completed_at {
                failed_category = Some(category);
                time_to_failure = duration_sec(job_start, completed);
            }
        }
    }

    Some(RunStats {
        id: run.id,
        month: run.created_at.format("%Y-%m").to_string(),
        passed: run.passed(),
        total_duration: duration_sec(job_start, job_end),
        category_durations,
        failed_category,
        time_to_failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::models::Step;

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap() + chrono::Duration::seconds(i64::from(secs))
    }

    fn step(name: &str, conclusion: &str, start: u32, end: u32) -> Step {
        Step {
            name: name.to_string(),
            conclusion: Some(conclusion.to_string()),
            started_at: Some(ts(start)),
            completed_at: Some(ts(end)),
        }
    }

    fn build_failure_run() -> WorkflowRun {
        // checkout 3s, install 40s, build 90s (failure), test skipped
        let job = Job {
            id: 1,
            name: "ci".to_string(),
            conclusion: Some("failure".to_string()),
            started_at: Some(ts(0)),
            completed_at: Some(ts(140)),
            steps: vec![
                step("Checkout repository", "success", 0, 3),
                step("Install npm dependencies", "success", 3, 43),
                step("Build packages", "failure", 43, 133),
                Step {
                    name: "Run tests".to_string(),
                    conclusion: Some("skipped".to_string()),
                    started_at: Some(ts(133)),
                    completed_at: Some(ts(133)),
                },
            ],
        };
        WorkflowRun {
            id: 100,
            head_branch: "feature-x".to_string(),
            conclusion: Some("failure".to_string()),
            status: "completed".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap(),
            updated_at: None,
            run_started_at: None,
            jobs: vec![job],
        }
    }

    #[test]
    fn test_build_failure_run_stats() {
        let stats = build_run_stats(&build_failure_run()).unwrap();

        assert_eq!(stats.month, "2025-06");
        assert!(!stats.passed);
        assert_eq!(stats.total_duration, 140.0);
        assert_eq!(stats.failed_category, Some(StepCategory::Build));
        assert_eq!(stats.time_to_failure, 133.0);
        assert_eq!(stats.category_duration(StepCategory::Checkout), 3.0);
        assert_eq!(stats.category_duration(StepCategory::Install), 40.0);
        assert_eq!(stats.category_duration(StepCategory::Build), 90.0);
        assert_eq!(stats.category_duration(StepCategory::Test), 0.0);
    }

    #[test]
    fn test_passing_run_has_zero_time_to_failure() {
        let mut run = build_failure_run();
        run.conclusion = Some("success".to_string());
        run.jobs[0].steps[2].conclusion = Some("success".to_string());

        let stats = build_run_stats(&run).unwrap();
        assert!(stats.passed);
        assert_eq!(stats.failed_category, None);
        assert_eq!(stats.time_to_failure, 0.0);
    }

    #[test]
    fn test_last_failing_step_wins() {
        let mut run = build_failure_run();
        run.jobs[0].steps.push(step("Lint code", "failure", 133, 135));

        let stats = build_run_stats(&run).unwrap();
        assert_eq!(stats.failed_category, Some(StepCategory::Lint));
        assert_eq!(stats.time_to_failure, 135.0);
    }

    #[test]
    fn test_run_without_ci_job_is_dropped() {
        let mut run = build_failure_run();
        run.jobs[0].name = "deploy".to_string();

        assert!(build_run_stats(&run).is_none());
    }

    #[test]
    fn test_run_with_untimed_ci_job_is_dropped() {
        let mut run = build_failure_run();
        run.jobs[0].completed_at = None;

        assert!(build_run_stats(&run).is_none());
    }

    #[test]
    fn test_steps_without_timestamps_add_no_duration() {
        let mut run = build_failure_run();
        run.jobs[0].steps.push(Step {
            name: "Run tests again".to_string(),
            conclusion: Some("success".to_string()),
            started_at: None,
            completed_at: None,
        });

        let stats = build_run_stats(&run).unwrap();
        assert_eq!(stats.category_duration(StepCategory::Test), 0.0);
    }
}
