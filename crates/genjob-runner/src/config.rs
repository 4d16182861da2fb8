//! Runner configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Attempt ceiling for both submission and polling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Base of the exponential backoff, in seconds.
pub const DEFAULT_BACKOFF_BASE: f64 = 1.5;

/// Wait between polls that report a non-terminal status.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Edge length of projected and extracted textures.
pub const DEFAULT_TEXTURE_SIZE: u32 = 1024;

/// Edge length of the square depth/normal captures.
pub const DEFAULT_CAPTURE_SIZE: u32 = 1024;

/// Retry and polling envelope applied to every remote task.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts per phase before the task fails.
    pub max_attempts: u32,

    /// Backoff before attempt `n + 1` is `backoff_base ^ n` seconds.
    pub backoff_base: f64,

    /// Wait between polls while the remote reports queued/in progress.
    pub poll_interval: Duration,

    /// Wall-clock bound on the polling phase. `None` polls until a terminal
    /// status or an exhausted error budget.
    pub poll_timeout: Option<Duration>,

    /// When true, a remote `failed` status fails the task. When false, any
    /// terminal remote status is accepted as success.
    pub strict_terminal_status: bool,
}

impl RetryPolicy {
    /// Backoff to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        Duration::from_secs_f64(self.backoff_base.powi(exponent))
    }

    /// Builder method to bound polling by wall-clock time.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    /// Builder method to set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builder method to accept any terminal remote status as success.
    pub fn with_legacy_terminal_status(mut self) -> Self {
        self.strict_terminal_status = false;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: None,
            strict_terminal_status: true,
        }
    }
}

/// Runner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Retry envelope for remote tasks.
    pub retry: RetryPolicy,

    /// Directory under which per-job staging directories are created.
    pub staging_root: PathBuf,

    /// Size of textures produced by UV projection.
    pub texture_size: u32,

    /// Size of the square scene captures.
    pub capture_size: u32,
}

impl RunnerConfig {
    /// Builder method to set the staging root.
    pub fn with_staging_root(mut self, staging_root: impl Into<PathBuf>) -> Self {
        self.staging_root = staging_root.into();
        self
    }

    /// Builder method to set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            staging_root: std::env::temp_dir().join("genjob"),
            texture_size: DEFAULT_TEXTURE_SIZE,
            capture_size: DEFAULT_CAPTURE_SIZE,
        }
    }
}
