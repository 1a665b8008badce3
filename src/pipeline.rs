//! Drives the end-to-end analysis and streams the report incrementally.
//!
//! The orchestrator owns one request's report from the first fetch to the
//! final chunk. Run histories for distinct workflows are fetched with
//! bounded concurrency, yet assessments are always delivered in workflow
//! listing order.

use std::sync::Arc;

use futures::{StreamExt as _, stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    client::WorkflowSource,
    env::Config,
    error::Error,
    framework::{StateError, retry_if_possible},
    insight::InsightGenerator,
    report::{HealthAssessment, Report, SkippedWorkflow},
    score,
    workflow::{RepoId, Workflow, WorkflowRun},
};

/// Capacity of the chunk channel handed to streaming callers.
const CHANNEL_CAPACITY: usize = 16;

/// An incremental piece of the report, emitted in workflow listing order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportChunk {
    /// Analysis started; this many workflows will follow.
    Started {
        /// How many workflows the repository defines.
        total: usize,
    },
    /// One workflow's finished assessment.
    Assessment(HealthAssessment),
    /// One workflow could not be assessed; the rest of the report proceeds.
    Skipped(SkippedWorkflow),
    /// The final, complete report. Always the last chunk of a successful
    /// analysis.
    Completed(Report),
    /// The analysis failed as a whole. Always the last chunk when emitted.
    Failed(String),
}

/// Sequences fetching, scoring and narration into a streamed report.
pub struct HealthAnalyzer {
    config: Config,
    source: Arc<dyn WorkflowSource>,
    insight: Arc<dyn InsightGenerator>,
}

impl std::fmt::Debug for HealthAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthAnalyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HealthAnalyzer {
    /// Creates an analyzer over the given source and insight provider.
    pub fn new(
        config: Config,
        source: Arc<dyn WorkflowSource>,
        insight: Arc<dyn InsightGenerator>,
    ) -> Self {
        Self {
            config,
            source,
            insight,
        }
    }

    /// Runs the full analysis and returns the completed report.
    ///
    /// An empty repository yields an empty report, not an error. A failure
    /// on one workflow's run history degrades into a skipped entry; only a
    /// failure of the workflow listing itself is fatal.
    ///
    /// # Errors
    ///
    /// Fails with the listing fetch's error when the workflow list cannot
    /// be retrieved at all.
    pub async fn analyze(&self, repo: &RepoId) -> Result<Report, Error> {
        self.run(repo, None).await
    }

    /// Streams the analysis as [`ReportChunk`]s, ending with
    /// [`ReportChunk::Completed`] or [`ReportChunk::Failed`].
    ///
    /// Dropping the receiver or triggering `cancel` abandons the remaining
    /// work, in-flight fetches included; nothing carries over into later
    /// requests.
    pub fn analyze_stream(
        self: &Arc<Self>,
        repo: RepoId,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ReportChunk> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let analyzer = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("analysis of {repo} cancelled");
                    drop(tx.send(ReportChunk::Failed(String::from("analysis cancelled"))).await);
                }
                result = analyzer.run(&repo, Some(&tx)) => match result {
                    Ok(report) => drop(tx.send(ReportChunk::Completed(report)).await),
                    Err(err) => drop(tx.send(ReportChunk::Failed(err.to_string())).await),
                }
            }
        });
        rx
    }

    async fn run(
        &self,
        repo: &RepoId,
        tx: Option<&mpsc::Sender<ReportChunk>>,
    ) -> Result<Report, Error> {
        info!("analyzing workflow health of {repo}…");

        let workflows = self.source.fetch_workflows(repo).await.inspect_err(|err| {
            error!("failed to list workflows of {repo}: {err}");
        })?;

        let mut report = Report::new(repo);
        if workflows.is_empty() {
            info!("{repo} defines no workflows");
            return Ok(report);
        }
        let total = workflows.len();
        if !emit(tx, ReportChunk::Started { total }).await {
            debug!("caller disconnected, abandoning analysis of {repo}");
            return Ok(report);
        }

        // `buffered` keeps listing order while up to `run_concurrency`
        // histories are in flight
        let mut assessed = stream::iter(workflows)
            .map(|workflow| self.assess_workflow(repo, workflow))
            .buffered(self.config.run_concurrency.max(1));

        while let Some(outcome) = assessed.next().await {
            let keep_going = match outcome {
                Ok(assessment) => {
                    let keep_going = emit(tx, ReportChunk::Assessment(assessment.clone())).await;
                    report.workflows.push(assessment);
                    keep_going
                }
                Err(skipped) => {
                    let keep_going = emit(tx, ReportChunk::Skipped(skipped.clone())).await;
                    report.skipped.push(skipped);
                    keep_going
                }
            };
            if !keep_going {
                debug!("caller disconnected, abandoning analysis of {repo}");
                return Ok(report);
            }
        }

        info!(
            "assessed {} of {total} workflows of {repo} ({} skipped)",
            report.workflows.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Fetches, scores and narrates one workflow. Failures degrade into a
    /// [`SkippedWorkflow`] so sibling assessments proceed untouched.
    async fn assess_workflow(
        &self,
        repo: &RepoId,
        workflow: Workflow,
    ) -> Result<HealthAssessment, SkippedWorkflow> {
        let runs = match self.fetch_runs_with_retry(repo, &workflow).await {
            Ok(runs) => runs,
            Err(reason) => {
                warn!("skipping workflow {workflow}: {reason}");
                return Err(SkippedWorkflow {
                    name: workflow.name,
                    reason,
                });
            }
        };

        let stats = score::statistics(&runs);
        let mut assessment = score::assess(&workflow, &stats);
        match self.insight.summarize(&workflow.name, &stats).await {
            Ok(summary) => assessment.summary = Some(summary),
            Err(err) => debug!("no narrative for {}: {err}", workflow.name),
        }
        Ok(assessment)
    }

    /// Fetches one run history, retrying transient failures up to the
    /// configured limit.
    async fn fetch_runs_with_retry(
        &self,
        repo: &RepoId,
        workflow: &Workflow,
    ) -> Result<Vec<WorkflowRun>, String> {
        let mut retry: u8 = 0;
        loop {
            match self.source.fetch_workflow_runs(repo, workflow.id).await {
                Ok(runs) => return Ok(runs),
                Err(err) => {
                    error!("failed to fetch runs of workflow {workflow}: {err}");
                    match classify(&err) {
                        StateError::Retry => {
                            match retry_if_possible(&mut retry, self.config.max_retries) {
                                Ok(()) => continue,
                                Err(()) => return Err(err.to_string()),
                            }
                        }
                        StateError::Cancelled => return Err(err.to_string()),
                    }
                }
            }
        }
    }
}

/// Transient transport failures and upstream 5xx verdicts are worth
/// retrying; schema violations, client-side verdicts and exhausted rate
/// limits are not.
fn classify(err: &Error) -> StateError {
    match err {
        Error::Request(err) if err.is_connect() || err.is_timeout() => StateError::Retry,
        Error::Upstream { status, .. } if *status >= 500 => StateError::Retry,
        _ => StateError::Cancelled,
    }
}

/// Forwards a chunk to the caller; `false` means the caller went away.
async fn emit(tx: Option<&mpsc::Sender<ReportChunk>>, chunk: ReportChunk) -> bool {
    match tx {
        Some(tx) => tx.send(chunk).await.is_ok(),
        None => true,
    }
}
