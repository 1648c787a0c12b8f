use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::analysis::categorize::StepCategory;
use crate::analysis::stats::{last_failed_category, RunStats};
use crate::models::{PullRequest, WorkflowRun};

/// Median of a numeric list; 0 for empty input. Even-length lists
/// average the two middle values.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Nearest-rank percentile; 0 for empty input.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let idx = (((p / 100.0) * sorted.len() as f64).ceil() as usize)
        .saturating_sub(1)
        .min(sorted.len() - 1);
    sorted[idx]
}

#[derive(Debug)]
pub struct DurationSummary {
    pub median: f64,
    pub p90: f64,
    pub passing_count: usize,
}

/// Median and p90 of total duration, restricted to passing runs.
pub fn duration_summary(stats: &[RunStats]) -> DurationSummary {
    let passing: Vec<f64> = stats.iter().filter(|r| r.passed).map(|r| r.total_duration).collect();
    DurationSummary {
        median: median(&passing),
        p90: percentile(&passing, 90.0),
        passing_count: passing.len(),
    }
}

#[derive(Debug)]
pub struct CategoryFailures {
    /// `None` groups failures with no failing step on record (job-level
    /// failures, or a failing step that never reported completion).
    pub category: Option<StepCategory>,
    pub count: usize,
    /// Share of all failing runs, 0..=1.
    pub share: f64,
    pub median_time_to_failure: f64,
}

#[derive(Debug)]
pub struct FailureBreakdown {
    pub total_runs: usize,
    pub passing: usize,
    pub failing: usize,
    /// Failing runs over total runs, 0..=1; 0 when there are no runs.
    pub failure_rate: f64,
    /// Per failed category, ordered by failure count descending.
    pub by_category: Vec<CategoryFailures>,
}

pub fn failure_breakdown(stats: &[RunStats]) -> FailureBreakdown {
    let total_runs = stats.len();
    let failing_runs: Vec<&RunStats> = stats.iter().filter(|r| !r.passed).collect();
    let failing = failing_runs.len();
    let passing = total_runs - failing;

    let mut times_by_category: IndexMap<Option<StepCategory>, Vec<f64>> = IndexMap::new();
    for run in &failing_runs {
        times_by_category
            .entry(run.failed_category)
            .or_default()
            .push(run.time_to_failure);
    }

    #[allow(clippy::cast_precision_loss)]
    let mut by_category: Vec<CategoryFailures> = times_by_category
        .into_iter()
        .map(|(category, times)| CategoryFailures {
            category,
            count: times.len(),
            share: times.len() as f64 / failing.max(1) as f64,
            median_time_to_failure: median(&times),
        })
        .collect();
    by_category.sort_by(|a, b| b.count.cmp(&a.count));

    #[allow(clippy::cast_precision_loss)]
    let failure_rate = failing as f64 / total_runs.max(1) as f64;

    FailureBreakdown {
        total_runs,
        passing,
        failing,
        failure_rate,
        by_category,
    }
}

#[derive(Debug)]
pub struct MonthlyStats {
    pub month: String,
    pub runs: usize,
    pub passing: usize,
    pub failing: usize,
    /// 0..=1.
    pub failure_rate: f64,
    /// Summed over all runs in the month.
    pub total_duration: f64,
    /// Summed over failing runs only.
    pub wasted_duration: f64,
    pub median_passing_duration: f64,
}

/// Group stats by calendar month, ascending.
pub fn monthly_breakdown(stats: &[RunStats]) -> Vec<MonthlyStats> {
    let mut by_month: BTreeMap<&str, Vec<&RunStats>> = BTreeMap::new();
    for run in stats {
        by_month.entry(run.month.as_str()).or_default().push(run);
    }

    by_month
        .into_iter()
        .map(|(month, runs)| {
            let failing: Vec<&&RunStats> = runs.iter().filter(|r| !r.passed).collect();
            let passing_durations: Vec<f64> =
                runs.iter().filter(|r| r.passed).map(|r| r.total_duration).collect();
            #[allow(clippy::cast_precision_loss)]
            let failure_rate = failing.len() as f64 / runs.len().max(1) as f64;
            MonthlyStats {
                month: month.to_string(),
                runs: runs.len(),
                passing: runs.len() - failing.len(),
                failing: failing.len(),
                failure_rate,
                total_duration: runs.iter().map(|r| r.total_duration).sum(),
                wasted_duration: failing.iter().map(|r| r.total_duration).sum(),
                median_passing_duration: median(&passing_durations),
            }
        })
        .collect()
}

/// Number of distinct calendar months observed; at least 1 so per-month
/// averages never divide by zero.
pub fn month_span(stats: &[RunStats]) -> usize {
    let months: std::collections::BTreeSet<&str> = stats.iter().map(|r| r.month.as_str()).collect();
    months.len().max(1)
}

/// One CI cycle within a pull request's timeline.
#[derive(Debug)]
pub struct PrCycle {
    pub duration: f64,
    pub passed: bool,
    pub failed_category: Option<StepCategory>,
}

#[derive(Debug)]
pub struct PrRollup {
    pub number: u64,
    pub branch: String,
    pub merged_at: DateTime<Utc>,
    /// Every meaningful run of the PR, including runs without a `ci`
    /// job (those contribute no cycle detail or pass/fail attribution).
    pub run_count: usize,
    /// Chronological by run creation time.
    pub cycles: Vec<PrCycle>,
    pub total_ci_time: f64,
    pub wasted_time: f64,
    pub passing_cycles: usize,
    pub failing_cycles: usize,
}

/// Group meaningful runs by owning PR and roll up CI time per PR.
///
/// Only merged PRs are reported, ordered by merge time descending. Run
/// durations come from the `ci` job span; runs without a `ci` job still
/// count toward `run_count` but get no cycle detail.
pub fn pr_rollups(
    meaningful: &[&WorkflowRun],
    branch_to_pr: &HashMap<&str, &PullRequest>,
) -> Vec<PrRollup> {
    let mut runs_by_pr: HashMap<u64, (&PullRequest, Vec<&WorkflowRun>)> = HashMap::new();
    for &run in meaningful {
        let Some(&pr) = branch_to_pr.get(run.head_branch.as_str()) else {
            continue;
        };
        runs_by_pr.entry(pr.number).or_insert((pr, Vec::new())).1.push(run);
    }

    let mut rollups: Vec<PrRollup> = runs_by_pr
        .into_values()
        .filter_map(|(pr, mut runs)| {
            let merged_at = pr.merged_at?;
            runs.sort_by_key(|r| r.created_at);

            let mut cycles = Vec::new();
            let mut total_ci_time = 0.0;
            let mut wasted_time = 0.0;
            let mut passing_cycles = 0;
            let mut failing_cycles = 0;

            for run in &runs {
                let Some(job) = run.ci_job() else { continue };
                let duration = job.duration_sec().unwrap_or(0.0);
                total_ci_time += duration;

                let passed = run.passed();
                if passed {
                    passing_cycles += 1;
                } else {
                    failing_cycles += 1;
                    wasted_time += duration;
                }

                cycles.push(PrCycle {
                    duration,
                    passed,
                    failed_category: last_failed_category(job),
                });
            }

            Some(PrRollup {
                number: pr.number,
                branch: pr.head_ref.clone(),
                merged_at,
                run_count: runs.len(),
                cycles,
                total_ci_time,
                wasted_time,
                passing_cycles,
                failing_cycles,
            })
        })
        .collect();

    rollups.sort_by(|a, b| b.merged_at.cmp(&a.merged_at));
    rollups
}
