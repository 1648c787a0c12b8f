use std::collections::HashMap;

use crate::analysis::aggregate::{
    duration_summary, failure_breakdown, month_span, monthly_breakdown, pr_rollups, PrRollup,
};
use crate::analysis::categorize::StepCategory;
use crate::analysis::simulate::{baseline, default_interventions, rank_interventions};
use crate::analysis::stats::{job_category_durations, last_failed_category, RunStats};
use crate::duration::format_duration;
use crate::models::{PullRequest, WorkflowRun};

const BRANCH_WIDTH: usize = 35;

/// Emit the full report to stdout. Section order is part of the tool's
/// contract: run listing, PR timelines and summary, aggregate
/// statistics, developer time impact, what-if ranking.
pub fn render(
    since: &str,
    meaningful: &[&WorkflowRun],
    stats: &[RunStats],
    branch_to_pr: &HashMap<&str, &PullRequest>,
) {
    print_run_listing(since, meaningful);
    print_pr_timelines(&pr_rollups(meaningful, branch_to_pr));
    print_aggregates(stats);
    print_time_impact(stats);
    print_what_if(stats);
}

fn truncate_branch(branch: &str) -> String {
    branch.chars().take(BRANCH_WIDTH).collect()
}

fn print_run_listing(since: &str, meaningful: &[&WorkflowRun]) {
    println!("# CI Run Analysis\n");
    println!("Runs since {since}, {} meaningful runs\n", meaningful.len());

    for run in meaningful {
        let Some(job) = run.ci_job() else { continue };

        let total = job.duration_sec().unwrap_or(0.0);
        let durations = job_category_durations(job);
        let bucket = |category: StepCategory| {
            format_duration(durations.get(&category).copied().unwrap_or(0.0))
        };

        let glyph = if run.passed() { "✓" } else { "✗" };
        let fail_info = last_failed_category(job)
            .map(|category| format!(" [failed: {category}]"))
            .unwrap_or_default();

        println!(
            "{glyph} {:>7} — {:<35} install {:>5}, build {:>5}, test {:>5}, lint {:>5}{fail_info}",
            format_duration(total),
            truncate_branch(&run.head_branch),
            bucket(StepCategory::Install),
            bucket(StepCategory::Build),
            bucket(StepCategory::Test),
            bucket(StepCategory::Lint),
        );
    }
}

fn print_pr_timelines(rollups: &[PrRollup]) {
    println!("\n# PR Timelines\n");
    println!("{} merged PRs with meaningful CI runs\n", rollups.len());

    for pr in rollups {
        println!("## PR #{} — {}", pr.number, pr.branch);
        println!(
            "Merged: {} | {} CI runs\n",
            pr.merged_at.format("%Y-%m-%d"),
            pr.run_count
        );

        for cycle in &pr.cycles {
            let glyph = if cycle.passed { "✓" } else { "✗" };
            let fail_info = cycle
                .failed_category
                .map(|category| format!(" (failed: {category})"))
                .unwrap_or_default();
            println!("- {glyph} {}{fail_info}", format_duration(cycle.duration));
        }

        println!(
            "\nTotal CI time: {} | Wasted (failing): {} | Cycles: {} ({} pass, {} fail)\n",
            format_duration(pr.total_ci_time),
            format_duration(pr.wasted_time),
            pr.run_count,
            pr.passing_cycles,
            pr.failing_cycles,
        );
    }

    if rollups.is_empty() {
        return;
    }

    println!("## PR Summary\n");
    for pr in rollups {
        let fail_info = if pr.failing_cycles > 0 {
            format!(", {} fail", pr.failing_cycles)
        } else {
            String::new()
        };
        let waste_info = if pr.wasted_time > 0.0 {
            format!(", {} wasted", format_duration(pr.wasted_time))
        } else {
            String::new()
        };
        println!(
            "- PR #{} ({}): {} runs, {} total{waste_info} ({} pass{fail_info})",
            pr.number,
            truncate_branch(&pr.branch),
            pr.run_count,
            format_duration(pr.total_ci_time),
            pr.passing_cycles,
        );
    }

    let total_ci: f64 = rollups.iter().map(|pr| pr.total_ci_time).sum();
    let total_wasted: f64 = rollups.iter().map(|pr| pr.wasted_time).sum();
    let total_cycles: usize = rollups.iter().map(|pr| pr.run_count).sum();
    println!(
        "\nAcross {} merged PRs: {total_cycles} CI runs, {} total CI time, {} wasted on failures",
        rollups.len(),
        format_duration(total_ci),
        format_duration(total_wasted),
    );
}

fn print_aggregates(stats: &[RunStats]) {
    println!("\n# Aggregate Statistics\n");

    let summary = duration_summary(stats);
    println!("## CI Duration (passing runs)\n");
    println!("- Median: {}", format_duration(summary.median));
    println!("- p90: {}", format_duration(summary.p90));
    println!("- Count: {} passing runs\n", summary.passing_count);

    let breakdown = failure_breakdown(stats);
    println!("## Failure Breakdown\n");
    println!(
        "- Total runs: {} ({} pass, {} fail)",
        breakdown.total_runs, breakdown.passing, breakdown.failing
    );
    println!("- Failure rate: {:.0}%\n", breakdown.failure_rate * 100.0);

    for category in &breakdown.by_category {
        println!(
            "- {}: {} ({:.0}%) — median time to failure {}",
            category.category.map(StepCategory::as_str).unwrap_or(""),
            category.count,
            category.share * 100.0,
            format_duration(category.median_time_to_failure),
        );
    }

    println!("\n## Monthly Breakdown\n");
    for month in monthly_breakdown(stats) {
        println!(
            "- {}: {} runs ({} pass, {} fail, {:.0}% fail rate) — {} total, {} wasted, median {}",
            month.month,
            month.runs,
            month.passing,
            month.failing,
            month.failure_rate * 100.0,
            format_duration(month.total_duration),
            format_duration(month.wasted_duration),
            format_duration(month.median_passing_duration),
        );
    }
}

fn print_time_impact(stats: &[RunStats]) {
    let totals = baseline(stats);
    let passing_time = totals.total - totals.wasted;
    #[allow(clippy::cast_precision_loss)]
    let months = month_span(stats) as f64;

    println!("\n## Developer Time Impact\n");
    println!(
        "- Total CI time: {} across {} runs",
        format_duration(totals.total),
        stats.len()
    );
    println!("- Time on passing runs: {}", format_duration(passing_time));
    println!(
        "- Time on failing runs (wasted): {}",
        format_duration(totals.wasted)
    );
    println!(
        "- Per month avg: {} total, {} wasted",
        format_duration(totals.total / months),
        format_duration(totals.wasted / months),
    );
}

fn print_what_if(stats: &[RunStats]) {
    println!("\n# What-If Analysis\n");

    let totals = baseline(stats);
    println!(
        "Baseline: {} total, {} wasted\n",
        format_duration(totals.total),
        format_duration(totals.wasted),
    );

    #[allow(clippy::cast_precision_loss)]
    let months = month_span(stats) as f64;
    let interventions = default_interventions();
    for result in rank_interventions(stats, &interventions) {
        println!(
            "- **{}**: {} total saved ({}/month), {} wasted saved ({}/month)",
            result.name,
            format_duration(result.total_saved),
            format_duration(result.total_saved / months),
            format_duration(result.wasted_saved),
            format_duration(result.wasted_saved / months),
        );
        println!("  {}", result.description);
    }
}
