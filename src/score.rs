//! Converts an ordered run history into a health assessment.
//!
//! Scoring is deterministic and free of side effects: the same run history
//! always produces the same assessment. Malformed histories never reach
//! this module; validation happens upstream.

use crate::{
    report::{HealthAssessment, HealthStatus, Trend},
    workflow::{Workflow, WorkflowRun},
};

/// Per-rank decay factor of the recency weighting. The most recent
/// completed run carries weight 1, the next `DECAY`, then `DECAY²`, and so
/// on, so recent outcomes always outweigh older ones of equal count.
const DECAY: f64 = 0.9;
/// How many of the most recent completed runs are inspected for failure
/// clustering.
const CLUSTER_WINDOW: usize = 10;
/// Consecutive failures within the window that flag acute instability.
const CLUSTER_THRESHOLD: usize = 3;
/// A clustered workflow is capped below the Healthy floor no matter how
/// good its lifetime rate looks.
const CLUSTER_CAP: f64 = 79.0;
/// Rate delta between the recent and older halves that counts as a trend.
const TREND_EPSILON: f64 = 0.1;
/// Completed runs needed before a trend is called at all.
const MIN_TREND_RUNS: usize = 4;
/// The percentage reported while a workflow has no completed runs yet.
/// Pending data lands in Needs Improvement, never in Healthy.
const PENDING_PERCENTAGE: f64 = 50.0;

/// Aggregated statistics of one workflow's run history.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    /// Every run the history contained, terminal or not.
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    /// Unweighted success rate over completed runs, in `[0, 1]`.
    pub success_rate: f64,
    /// Recency-weighted success rate over completed runs, in `[0, 1]`.
    pub weighted_rate: f64,
    /// Length of the consecutive-failure streak ending at the most recent
    /// completed run.
    pub failure_streak: usize,
    /// Whether the trailing window contains a failure cluster.
    pub clustered: bool,
    pub trend: Trend,
}

/// Aggregates a run history, newest first, into [`RunStatistics`].
pub fn statistics(runs: &[WorkflowRun]) -> RunStatistics {
    let outcomes: Vec<bool> = runs.iter().filter_map(WorkflowRun::outcome).collect();
    let successful_runs = outcomes.iter().filter(|success| **success).count();
    let failed_runs = outcomes.len() - successful_runs;
    let success_rate = if outcomes.is_empty() {
        0.0
    } else {
        successful_runs as f64 / outcomes.len() as f64
    };
    let window = &outcomes[..outcomes.len().min(CLUSTER_WINDOW)];

    RunStatistics {
        total_runs: runs.len(),
        successful_runs,
        failed_runs,
        success_rate,
        weighted_rate: weighted_rate(&outcomes),
        failure_streak: outcomes.iter().take_while(|success| !**success).count(),
        clustered: longest_failure_streak(window) >= CLUSTER_THRESHOLD,
        trend: trend(&outcomes),
    }
}

/// Derives the assessment of one workflow from its statistics. The
/// narrative is left empty; the insight provider fills it in later.
pub fn assess(workflow: &Workflow, stats: &RunStatistics) -> HealthAssessment {
    let percentage = status_percentage(stats);
    HealthAssessment {
        name: workflow.name.clone(),
        status: HealthStatus::from_percentage(percentage),
        status_percentage: percentage,
        file_path: workflow.path.clone(),
        last_updated: workflow.updated_at,
        total_runs: stats.total_runs,
        successful_runs: stats.successful_runs,
        failed_runs: stats.failed_runs,
        success_rate: stats.success_rate,
        trend: stats.trend,
        summary: None,
    }
}

/// Folds the weighted rate and the clustering signal into `[0, 100]`.
fn status_percentage(stats: &RunStatistics) -> f64 {
    if stats.successful_runs + stats.failed_runs == 0 {
        return PENDING_PERCENTAGE;
    }
    let percentage = (stats.weighted_rate * 100.0).round();
    if stats.clustered {
        percentage.min(CLUSTER_CAP)
    } else {
        percentage
    }
}

/// Success rate with exponentially decaying weight by recency rank.
fn weighted_rate(outcomes: &[bool]) -> f64 {
    let mut weight = 1.0;
    let mut total = 0.0;
    let mut successful = 0.0;
    for success in outcomes {
        total += weight;
        if *success {
            successful += weight;
        }
        weight *= DECAY;
    }
    if total == 0.0 { 0.0 } else { successful / total }
}

fn longest_failure_streak(window: &[bool]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for success in window {
        if *success {
            current = 0;
        } else {
            current += 1;
            longest = longest.max(current);
        }
    }
    longest
}

/// Compares the weighted rate of the recent half of completed runs against
/// the older half.
fn trend(outcomes: &[bool]) -> Trend {
    if outcomes.len() < MIN_TREND_RUNS {
        return Trend::Stable;
    }
    let (recent, older) = outcomes.split_at(outcomes.len() / 2);
    let delta = weighted_rate(recent) - weighted_rate(older);
    if delta > TREND_EPSILON {
        Trend::Improving
    } else if delta < -TREND_EPSILON {
        Trend::Degrading
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{RunConclusion, RunStatus, WorkflowState};
    use chrono::{Duration, TimeZone as _, Utc};

    fn fixture_workflow() -> Workflow {
        Workflow {
            id: 161335,
            name: String::from("CI"),
            path: String::from(".github/workflows/ci.yml"),
            state: WorkflowState::Active,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            html_url: String::new(),
            badge_url: String::new(),
        }
    }

    /// Builds a history, newest first, from outcome markers:
    /// `'s'` success, `'f'` failure, `'p'` pending, `'c'` cancelled.
    fn history(markers: &str) -> Vec<WorkflowRun> {
        let newest = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        markers
            .chars()
            .enumerate()
            .map(|(index, marker)| {
                let (status, conclusion) = match marker {
                    's' => (RunStatus::Completed, Some(RunConclusion::Success)),
                    'f' => (RunStatus::Completed, Some(RunConclusion::Failure)),
                    'c' => (RunStatus::Completed, Some(RunConclusion::Cancelled)),
                    _ => (RunStatus::InProgress, None),
                };
                WorkflowRun {
                    id: index as u64 + 1,
                    name: String::from("CI"),
                    status,
                    conclusion,
                    workflow_id: 161335,
                    created_at: newest - Duration::hours(index as i64),
                    updated_at: newest - Duration::hours(index as i64),
                    run_started_at: None,
                    html_url: String::new(),
                }
            })
            .collect()
    }

    fn assessment_of(markers: &str) -> HealthAssessment {
        let runs = history(markers);
        assess(&fixture_workflow(), &statistics(&runs))
    }

    #[test]
    fn counts_never_exceed_the_total() {
        for markers in ["", "p", "ssff", "pcsfps", "cccc", "sssssssssp"] {
            let stats = statistics(&history(markers));
            assert!(
                stats.successful_runs + stats.failed_runs <= stats.total_runs,
                "history {markers:?}"
            );
        }
    }

    #[test]
    fn bucket_always_matches_the_percentage() {
        for markers in ["", "ssss", "ffff", "fffsssssss", "sfsfsf", "ppp"] {
            let assessment = assessment_of(markers);
            assert_eq!(
                assessment.status,
                HealthStatus::from_percentage(assessment.status_percentage),
                "history {markers:?}"
            );
        }
    }

    #[test]
    fn recent_outcomes_outweigh_older_ones() {
        let recent_failures = statistics(&history("ffsss"));
        let older_failures = statistics(&history("sssff"));
        assert!(recent_failures.weighted_rate < older_failures.weighted_rate);
    }

    #[test]
    fn a_recent_failure_streak_is_never_healthy() {
        // 3 recent failures over an otherwise perfect long history
        let assessment = assessment_of("fffssssssssssssssssss");
        assert!(assessment.status_percentage <= 79.0);
        assert_ne!(assessment.status, HealthStatus::Healthy);
    }

    #[test]
    fn clustering_caps_a_high_weighted_rate() {
        // the streak sits just inside the trailing window behind recent successes
        let stats = statistics(&history("ssssfffsssssssssssss"));
        assert!(stats.clustered);
        let assessment = assessment_of("ssssfffsssssssssssss");
        assert!(assessment.status_percentage <= 79.0);
    }

    #[test]
    fn two_failures_in_a_row_do_not_cluster() {
        let stats = statistics(&history("ffssssssss"));
        assert!(!stats.clustered);
    }

    #[test]
    fn ci_scenario_despite_high_lifetime_rate() {
        // 20 runs: the last 3 failed, 14 earlier successes, 3 still pending
        let assessment = assessment_of("fffsspsspsssspssssss");
        assert!(matches!(
            assessment.status,
            HealthStatus::AtRisk | HealthStatus::NeedsImprovement
        ));
    }

    #[test]
    fn deploy_scenario_all_successes_is_healthy() {
        let assessment = assessment_of("ssssssssss");
        assert_eq!(assessment.status, HealthStatus::Healthy);
        assert_eq!(assessment.status_percentage, 100.0);
        assert_eq!(assessment.success_rate, 1.0);
    }

    #[test]
    fn no_completed_runs_falls_back_to_needs_improvement() {
        for markers in ["", "ppp", "cc"] {
            let assessment = assessment_of(markers);
            assert_eq!(assessment.status_percentage, PENDING_PERCENTAGE);
            assert_eq!(assessment.status, HealthStatus::NeedsImprovement);
        }
    }

    #[test]
    fn only_non_terminal_runs_do_not_panic() {
        let stats = statistics(&history("pppppppp"));
        assert_eq!(stats.total_runs, 8);
        assert_eq!(stats.successful_runs, 0);
        assert_eq!(stats.failed_runs, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn scoring_is_idempotent() {
        let runs = history("ffspssfsssssps");
        let first = assess(&fixture_workflow(), &statistics(&runs));
        let second = assess(&fixture_workflow(), &statistics(&runs));
        assert_eq!(first, second);
    }

    #[test]
    fn trends_follow_the_recent_half() {
        assert_eq!(statistics(&history("ssssffff")).trend, Trend::Improving);
        assert_eq!(statistics(&history("ffffssss")).trend, Trend::Degrading);
        assert_eq!(statistics(&history("ssssssss")).trend, Trend::Stable);
        // too few completed runs to call a direction
        assert_eq!(statistics(&history("sf")).trend, Trend::Stable);
    }

    #[test]
    fn cancelled_runs_count_toward_the_total_only() {
        let stats = statistics(&history("scsf"));
        assert_eq!(stats.total_runs, 4);
        assert_eq!(stats.successful_runs, 2);
        assert_eq!(stats.failed_runs, 1);
    }

    #[test]
    fn failure_streak_measures_the_most_recent_runs() {
        assert_eq!(statistics(&history("ffsff")).failure_streak, 2);
        assert_eq!(statistics(&history("sfff")).failure_streak, 0);
        assert_eq!(statistics(&history("fff")).failure_streak, 3);
    }
}
