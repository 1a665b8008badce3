//! Data models of GitHub Actions workflows and their runs.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};

use crate::error::Error;

/// Identifies a repository as an `owner/name` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    /// The account or organization owning the repository.
    pub owner: String,
    /// The repository name.
    pub name: String,
}

impl RepoId {
    /// Creates a [`RepoId`] from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either part is empty or contains a slash.
    pub fn new(owner: &str, name: &str) -> Result<Self, Error> {
        if owner.is_empty() || name.is_empty() {
            return Err(Error::InvalidInput(String::from(
                "owner and repository must both be non-empty",
            )));
        }
        if owner.contains('/') || name.contains('/') {
            return Err(Error::InvalidInput(format!(
                "`{owner}/{name}` contains a stray slash"
            )));
        }
        Ok(Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
        })
    }
}

impl FromStr for RepoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) => Self::new(owner, name),
            None => Err(Error::InvalidInput(format!(
                "expected `owner/repo`, got `{s}`"
            ))),
        }
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The lifecycle state of a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    /// The workflow is enabled and may run.
    Active,
    /// The workflow was disabled, manually or by inactivity.
    Disabled,
    /// The workflow file was deleted.
    Deleted,
    /// A state this crate does not know about, kept verbatim.
    Other(String),
}

impl WorkflowState {
    /// Normalizes the state string reported by the API.
    pub fn from_api(state: &str) -> Self {
        match state {
            "active" => Self::Active,
            "deleted" => Self::Deleted,
            _ if state.starts_with("disabled") => Self::Disabled,
            _ => Self::Other(state.to_owned()),
        }
    }
}

/// Represents a GitHub Actions workflow definition. A snapshot per fetch,
/// never persisted between invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub state: WorkflowState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
    pub badge_url: String,
}

impl Display for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} at {})", self.name, self.id, self.path)
    }
}

/// Execution status of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    /// A status this crate does not know about, kept verbatim.
    Other(String),
}

impl RunStatus {
    /// Normalizes the status string reported by the API.
    pub fn from_api(status: &str) -> Self {
        match status {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::Other(status.to_owned()),
        }
    }
}

/// Terminal conclusion of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    /// A conclusion this crate does not know about, kept verbatim.
    Other(String),
}

impl RunConclusion {
    /// Normalizes the conclusion string reported by the API.
    pub fn from_api(conclusion: &str) -> Self {
        match conclusion {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(conclusion.to_owned()),
        }
    }
}

/// Represents one execution of a workflow, ordered newest first once it
/// leaves the retrieval layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub id: u64,
    /// The display name; the API may omit it on old runs.
    pub name: String,
    pub status: RunStatus,
    /// `None` while the run has not finished.
    pub conclusion: Option<RunConclusion>,
    pub workflow_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub run_started_at: Option<DateTime<Utc>>,
    pub html_url: String,
}

impl WorkflowRun {
    /// `Some(true)` for a successful run, `Some(false)` for a failed one,
    /// `None` for anything still pending or concluded another way.
    pub fn outcome(&self) -> Option<bool> {
        match &self.conclusion {
            Some(RunConclusion::Success) => Some(true),
            Some(RunConclusion::Failure) => Some(false),
            _ => None,
        }
    }
}
