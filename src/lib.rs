//! Workflow health analysis over the GitHub Actions REST API.
//!
//! Fetches a repository's workflow definitions and run histories, validates
//! the untrusted payloads, scores each workflow's recent reliability, and
//! assembles a report that streams to the caller while later workflows are
//! still being fetched.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use actions_health::{
//!     client::GithubClient, env::Config, insight::ClaudeInsight,
//!     pipeline::HealthAnalyzer, workflow::RepoId,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let analyzer = Arc::new(HealthAnalyzer::new(
//!     config.clone(),
//!     Arc::new(GithubClient::new(&config)),
//!     Arc::new(ClaudeInsight::new(&config)),
//! ));
//!
//! let repo: RepoId = "octo-org/octo-repo".parse()?;
//! let mut chunks = analyzer.analyze_stream(repo, CancellationToken::new());
//! while let Some(chunk) = chunks.recv().await {
//!     // render each assessment as it arrives
//!     println!("{chunk:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod env;
pub mod error;
pub mod framework;
pub mod insight;
pub mod pipeline;
pub mod report;
pub mod score;
pub mod validate;
pub mod workflow;
