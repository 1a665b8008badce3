//! Narrative generation for assessments through a pluggable provider.

use async_trait::async_trait;

use crate::{error::Error, score::RunStatistics};

#[cfg(feature = "insight")]
pub use claude::ClaudeInsight;

/// Produces a short narrative for a workflow's run statistics.
///
/// Implementations may fail transiently. The pipeline treats a missing
/// narrative as a degraded assessment, never as a failed report, so
/// implementations should fail rather than stall.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    /// Summarizes the statistics of the named workflow in a sentence or two.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsightUnavailable`] if no narrative can be produced.
    async fn summarize(&self, workflow_name: &str, stats: &RunStatistics) -> Result<String, Error>;
}

/// A generator that never produces a narrative. Assessments keep an empty
/// summary, which callers render as statistics only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInsight;

#[async_trait]
impl InsightGenerator for NoInsight {
    async fn summarize(
        &self,
        _workflow_name: &str,
        _stats: &RunStatistics,
    ) -> Result<String, Error> {
        Err(Error::InsightUnavailable(String::from(
            "narrative generation disabled",
        )))
    }
}

#[cfg(feature = "insight")]
mod claude {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, info};

    use crate::{env::Config, error::Error, score::RunStatistics};

    use super::InsightGenerator;

    /// Anthropic API version header value.
    const ANTHROPIC_VERSION: &str = "2023-06-01";
    const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
    const MODEL: &str = "claude-3-5-haiku-20241022";
    const MAX_TOKENS: u32 = 256;
    /// Narrative latency dominates the pipeline; a stalled provider is cut
    /// off rather than holding the report open.
    const TIMEOUT: Duration = Duration::from_secs(15);

    /// An [`InsightGenerator`] backed by the Anthropic messages API.
    #[derive(Debug, Clone)]
    pub struct ClaudeInsight {
        http: reqwest::Client,
        api_key: String,
    }

    impl ClaudeInsight {
        /// Creates a generator from the process configuration.
        pub fn new(config: &Config) -> Self {
            Self {
                http: reqwest::Client::new(),
                api_key: config.insight_api_key.clone(),
            }
        }

        fn prompt(workflow_name: &str, stats: &RunStatistics) -> String {
            format!(
                "The CI workflow `{workflow_name}` has {} recent runs: {} succeeded, \
                 {} failed, weighted success rate {:.0}%, trend {}, current failure \
                 streak {}. Write one or two plain sentences assessing its reliability \
                 for an engineer skimming a report. Do not restate the raw numbers.",
                stats.total_runs,
                stats.successful_runs,
                stats.failed_runs,
                stats.weighted_rate * 100.0,
                stats.trend,
                stats.failure_streak,
            )
        }
    }

    #[derive(Debug, Serialize)]
    struct MessagesRequest<'a> {
        model: &'a str,
        max_tokens: u32,
        messages: Vec<Message<'a>>,
    }

    #[derive(Debug, Serialize)]
    struct Message<'a> {
        role: &'a str,
        content: String,
    }

    #[derive(Debug, Deserialize)]
    struct MessagesResponse {
        content: Vec<ContentBlock>,
    }

    #[derive(Debug, Deserialize)]
    struct ContentBlock {
        #[serde(rename = "type")]
        kind: String,
        text: Option<String>,
    }

    #[async_trait]
    impl InsightGenerator for ClaudeInsight {
        async fn summarize(
            &self,
            workflow_name: &str,
            stats: &RunStatistics,
        ) -> Result<String, Error> {
            debug!("requesting narrative for {workflow_name}…");

            let request = MessagesRequest {
                model: MODEL,
                max_tokens: MAX_TOKENS,
                messages: vec![Message {
                    role: "user",
                    content: Self::prompt(workflow_name, stats),
                }],
            };

            let response = self
                .http
                .post(ENDPOINT)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .timeout(TIMEOUT)
                .json(&request)
                .send()
                .await
                .map_err(|err| Error::InsightUnavailable(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::InsightUnavailable(format!(
                    "provider responded {status}: {body}"
                )));
            }

            let message = response
                .json::<MessagesResponse>()
                .await
                .map_err(|err| Error::InsightUnavailable(err.to_string()))?;
            let narrative = message
                .content
                .iter()
                .filter(|block| block.kind == "text")
                .filter_map(|block| block.text.as_deref())
                .collect::<Vec<_>>()
                .join("");

            if narrative.is_empty() {
                return Err(Error::InsightUnavailable(String::from(
                    "provider returned no text",
                )));
            }
            info!("generated narrative for {workflow_name}");
            Ok(narrative)
        }
    }

}
