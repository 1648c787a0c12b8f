use crate::analysis::categorize::StepCategory;
use crate::analysis::stats::RunStats;

/// Estimated CI cost of a bare type check replacing the full build,
/// based on local benchmarks scaled by the observed local-to-CI
/// slowdown for CPU-bound compilation.
pub const TYPECHECK_CI_SECONDS: f64 = 30.0;

/// Categories whose execution order the reordering simulation may
/// change. Everything else (checkout, install, setup, ...) is a fixed
/// base that always runs first.
pub const REORDERABLE_CATEGORIES: [StepCategory; 3] =
    [StepCategory::Build, StepCategory::Test, StepCategory::Lint];

/// A named hypothetical pipeline change, expressed as a pure transform
/// over one run's statistics. Outputs feed aggregate comparison only
/// and are never written back to the cache.
pub struct Intervention {
    pub name: String,
    pub description: String,
    transform: Box<dyn Fn(&RunStats) -> RunStats>,
}

impl Intervention {
    pub fn apply(&self, run: &RunStats) -> RunStats {
        (self.transform)(run)
    }
}

#[derive(Debug, PartialEq)]
pub struct SimOutcome {
    pub total_duration: f64,
    pub time_to_failure: f64,
}

/// Reconstruct a run's duration and failure point under an alternate
/// category order.
///
/// Non-reorderable categories run first as a fixed base; the requested
/// order is then walked, and a failure in one of its categories stops
/// the pipeline the instant that category completes. A failure outside
/// the reorderable set leaves the recorded duration and failure point
/// unchanged.
///
/// Known simplification carried over from the recorded pipeline model:
/// exactly one fatal step terminates the run, and partially parallel
/// step execution cannot be represented.
pub fn simulate_order(run: &RunStats, order: &[StepCategory]) -> SimOutcome {
    let base: f64 = run
        .category_durations
        .iter()
        .filter(|(category, _)| !REORDERABLE_CATEGORIES.contains(category))
        .map(|(_, duration)| duration)
        .sum();

    let mut elapsed = base;
    let mut failed_at = None;
    for category in order {
        elapsed += run.category_duration(*category);
        if failed_at.is_none() && run.failed_category == Some(*category) {
            failed_at = Some(elapsed);
        }
    }

    match failed_at {
        // Steps after a fatal failure do not run.
        Some(time_to_failure) => SimOutcome {
            total_duration: time_to_failure,
            time_to_failure,
        },
        // Failure outside the reorderable set: the intervention has no
        // effect on that failure path.
        None if !run.passed => SimOutcome {
            total_duration: run.total_duration,
            time_to_failure: run.time_to_failure,
        },
        None => SimOutcome {
            total_duration: elapsed,
            time_to_failure: 0.0,
        },
    }
}

fn typecheck_catches_build_failure(run: &RunStats) -> RunStats {
    // Run ends once install finishes and the type check fails.
    let failure_point = run.category_duration(StepCategory::Install) + TYPECHECK_CI_SECONDS;
    let mut out = run.clone();
    out.total_duration = failure_point;
    out.time_to_failure = failure_point;
    out
}

fn add_typecheck_before_build() -> Intervention {
    Intervention {
        name: "Add typecheck before build".to_string(),
        description: format!(
            "Run a type check (~{TYPECHECK_CI_SECONDS:.0}s) before the build. \
             Build failures are caught earlier; passing runs get slightly slower."
        ),
        transform: Box::new(|run| {
            if run.failed_category == Some(StepCategory::Build) {
                return typecheck_catches_build_failure(run);
            }
            let mut out = run.clone();
            out.total_duration += TYPECHECK_CI_SECONDS;
            out
        }),
    }
}

fn replace_build_with_typecheck() -> Intervention {
    Intervention {
        name: "Replace build with typecheck".to_string(),
        description: format!(
            "Drop the full build from CI entirely, run a type check \
             (~{TYPECHECK_CI_SECONDS:.0}s) instead. Rely on deployment for build errors."
        ),
        transform: Box::new(|run| {
            if run.failed_category == Some(StepCategory::Build) {
                return typecheck_catches_build_failure(run);
            }
            let build = run.category_duration(StepCategory::Build);
            let mut out = run.clone();
            out.total_duration = (run.total_duration - build + TYPECHECK_CI_SECONDS).max(0.0);
            out.category_durations.insert(StepCategory::Build, TYPECHECK_CI_SECONDS);
            out
        }),
    }
}

fn instant_install() -> Intervention {
    Intervention {
        name: "Instant dependency install".to_string(),
        description: "Zero out the install step (full dependency cache).".to_string(),
        transform: Box::new(|run| {
            let install = run.category_duration(StepCategory::Install);
            let mut out = run.clone();
            out.total_duration = (run.total_duration - install).max(0.0);
            out.time_to_failure = (run.time_to_failure - install).max(0.0);
            out.category_durations.insert(StepCategory::Install, 0.0);
            out
        }),
    }
}

/// All six orderings of the reorderable categories, with the build
/// re-costed to a bare type check before simulation.
const ORDERINGS: [[StepCategory; 3]; 6] = [
    [StepCategory::Build, StepCategory::Test, StepCategory::Lint],
    [StepCategory::Build, StepCategory::Lint, StepCategory::Test],
    [StepCategory::Lint, StepCategory::Build, StepCategory::Test],
    [StepCategory::Lint, StepCategory::Test, StepCategory::Build],
    [StepCategory::Test, StepCategory::Build, StepCategory::Lint],
    [StepCategory::Test, StepCategory::Lint, StepCategory::Build],
];

fn reorder_intervention(order: [StepCategory; 3]) -> Intervention {
    let sequence = order.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" -> ");
    Intervention {
        name: format!("Order: {sequence}"),
        description: format!(
            "Replace the build with a type check (~{TYPECHECK_CI_SECONDS:.0}s) and run \
             the checks in order {sequence}."
        ),
        transform: Box::new(move |run| {
            let mut out = run.clone();
            out.category_durations.insert(StepCategory::Build, TYPECHECK_CI_SECONDS);
            let outcome = simulate_order(&out, &order);
            out.total_duration = outcome.total_duration;
            out.time_to_failure = outcome.time_to_failure;
            out
        }),
    }
}

pub fn default_interventions() -> Vec<Intervention> {
    let mut interventions = vec![
        add_typecheck_before_build(),
        replace_build_with_typecheck(),
        instant_install(),
    ];
    interventions.extend(ORDERINGS.into_iter().map(reorder_intervention));
    interventions
}

/// Actual recorded totals that intervention outcomes are compared
/// against.
#[derive(Debug, Clone, Copy)]
pub struct Baseline {
    pub total: f64,
    pub wasted: f64,
}

pub fn baseline(stats: &[RunStats]) -> Baseline {
    Baseline {
        total: stats.iter().map(|r| r.total_duration).sum(),
        wasted: stats.iter().filter(|r| !r.passed).map(|r| r.total_duration).sum(),
    }
}

#[derive(Debug)]
pub struct InterventionResult {
    pub name: String,
    pub description: String,
    pub total_saved: f64,
    pub wasted_saved: f64,
}

/// Apply every intervention across the full collection and rank by
/// total time saved, descending.
pub fn rank_interventions(
    stats: &[RunStats],
    interventions: &[Intervention],
) -> Vec<InterventionResult> {
    let recorded = baseline(stats);

    let mut results: Vec<InterventionResult> = interventions
        .iter()
        .map(|intervention| {
            let transformed: Vec<RunStats> = stats.iter().map(|r| intervention.apply(r)).collect();
            let outcome = baseline(&transformed);
            InterventionResult {
                name: intervention.name.clone(),
                description: intervention.description.clone(),
                total_saved: recorded.total - outcome.total,
                wasted_saved: recorded.wasted - outcome.wasted,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.total_saved
            .partial_cmp(&a.total_saved)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}
