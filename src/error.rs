//! The error taxonomy of the analysis pipeline.

use thiserror::Error as ThisError;

/// A violation found while validating an upstream payload.
///
/// Carries the first violation only; validation stops at the offending
/// field instead of propagating it downstream.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("invalid payload at `{path}`: expected {expected}, found {found}")]
pub struct SchemaError {
    /// Where the violation sits, e.g. `workflow_runs[3].id`.
    pub path: String,
    /// What the field was expected to hold.
    pub expected: &'static str,
    /// What the payload actually held.
    pub found: String,
}

/// Errors produced by the analysis pipeline.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum Error {
    /// The repository identifier is malformed. User-correctable; surfaces
    /// before any network activity.
    #[error("invalid repository: {0}")]
    InvalidInput(String),

    /// The source-control API answered with a non-2xx status. Rate-limit
    /// responses land here as well.
    #[error("upstream responded {status}: {message}")]
    Upstream {
        /// The HTTP status code of the response.
        status: u16,
        /// The upstream message, or the status reason when there is none.
        message: String,
    },

    /// An outbound request failed before any response arrived.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// An upstream payload failed structural validation.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Narrative generation failed or timed out. Degrades the assessment,
    /// never the report.
    #[error("insight generation unavailable: {0}")]
    InsightUnavailable(String),
}

impl Error {
    /// Whether this is a rate-limit verdict from the upstream API.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Upstream { status: 429, .. } => true,
            Self::Upstream {
                status: 403,
                message,
            } => message.contains("rate limit"),
            _ => false,
        }
    }
}
