//! Process-wide configuration, constructed once at startup and passed down.

#[cfg(feature = "env")]
use std::env;

#[cfg(feature = "env")]
use anyhow::Context as _;

/// The retry limit applied when no `MAX_RETRIES` override is given.
pub const DEFAULT_MAX_RETRIES: u8 = 5;
/// The run-fetch concurrency applied when no `RUN_CONCURRENCY` override is given.
pub const DEFAULT_RUN_CONCURRENCY: usize = 4;

/// Parses an environment variable from [`String`] to something else, wrapping any error in [`anyhow::Error`].
#[cfg(feature = "env")]
#[macro_export]
macro_rules! parse_env {
    ($key:expr => |$var:ident| $expr:expr) => {
        std::env::var($key)
            .map_err(|e| anyhow::anyhow!(e))
            .and_then(|$var| $expr)
    };
    ($key:expr => |$var:ident| $expr:expr; anyhow) => {
        parse_env!($key => |$var| $expr.map_err(|e| anyhow::anyhow!(e)))
    };
}

#[cfg(feature = "env")]
pub use parse_env;

/// Everything the pipeline needs from its environment, resolved once at
/// process start. Requests never read configuration on their own.
#[derive(Debug, Clone)]
pub struct Config {
    /// The GitHub token attached to every source-control API request.
    pub github_token: String,
    /// The credential of the insight provider.
    pub insight_api_key: String,
    /// Front-end origins allowed to call the pipeline. Enforced by the
    /// transport layer; carried here so it is not read ambiently.
    pub allowed_origins: Vec<String>,
    /// The maximum retry limit for run-history fetches.
    pub max_retries: u8,
    /// How many run histories may be fetched concurrently.
    pub run_concurrency: usize,
}

impl Config {
    /// Creates a configuration with default tuning from the two required
    /// credentials.
    pub fn new(github_token: String, insight_api_key: String) -> Self {
        Self {
            github_token,
            insight_api_key,
            allowed_origins: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            run_concurrency: DEFAULT_RUN_CONCURRENCY,
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// # Errors
    ///
    /// Fails if `GITHUB_TOKEN` or `INSIGHT_API_KEY` is not set. Both are
    /// required at process start; their absence is a configuration error,
    /// never a per-request one.
    #[cfg(feature = "env")]
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            github_token: env::var("GITHUB_TOKEN").context("GITHUB_TOKEN not set in environment")?,
            insight_api_key: env::var("INSIGHT_API_KEY")
                .context("INSIGHT_API_KEY not set in environment")?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            max_retries: parse_env!("MAX_RETRIES" => |s| s.parse::<u8>(); anyhow)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            run_concurrency: parse_env!("RUN_CONCURRENCY" => |s| s.parse::<usize>(); anyhow)
                .unwrap_or(DEFAULT_RUN_CONCURRENCY),
        })
    }
}
