//! The assembled report and its wire shape.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::workflow::RepoId;

/// The three-tier health classification of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// Percentage 80–100.
    Healthy,
    /// Percentage 50–79, and the fallback while a workflow has no data.
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    /// Percentage 0–49.
    #[serde(rename = "At Risk")]
    AtRisk,
}

impl HealthStatus {
    /// Maps a percentage to its bucket. Boundaries are inclusive at the
    /// lower edge of each tier.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            Self::Healthy
        } else if percentage >= 50.0 {
            Self::NeedsImprovement
        } else {
            Self::AtRisk
        }
    }
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Healthy => "Healthy",
            Self::NeedsImprovement => "Needs Improvement",
            Self::AtRisk => "At Risk",
        })
    }
}

/// Direction of a workflow's reliability over its run history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// The recent half of runs succeeds notably more than the older half.
    Improving,
    /// No notable movement either way.
    Stable,
    /// The recent half of runs succeeds notably less than the older half.
    Degrading,
}

impl Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Degrading => "degrading",
        })
    }
}

/// The derived health of one workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAssessment {
    pub name: String,
    pub status: HealthStatus,
    /// Health score in `[0, 100]`.
    pub status_percentage: f64,
    pub file_path: String,
    pub last_updated: DateTime<Utc>,
    /// Every fetched run, terminal or not.
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    /// Unweighted success rate over completed runs, in `[0, 1]`.
    pub success_rate: f64,
    pub trend: Trend,
    /// The narrative, when the insight provider produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// A workflow whose assessment could not be computed. Flags the gap so a
/// partial report stays honest about what is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedWorkflow {
    pub name: String,
    pub reason: String,
}

/// One analysis request's complete result. Created fresh per request and
/// owned by that request's orchestrator until finalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// The queried repository as `owner/name`.
    pub repository: String,
    /// One assessment per workflow, in listing order.
    pub workflows: Vec<HealthAssessment>,
    /// Workflows whose run histories could not be retrieved.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedWorkflow>,
}

impl Report {
    /// Creates an empty report for the given repository.
    pub fn new(repository: &RepoId) -> Self {
        Self {
            repository: repository.to_string(),
            workflows: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Encodes the report as the string payload handed to callers.
    ///
    /// # Errors
    ///
    /// Fails if the report cannot be serialized, which the shape of these
    /// types rules out in practice.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
