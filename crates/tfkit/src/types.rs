//! Configuration types for the Terraform engine.

use std::path::PathBuf;
use std::time::Duration;

/// Default provider registry source.
pub const DEFAULT_PROVIDER_SOURCE: &str = "IBM-Cloud/ibm";

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Terraform binary name or path
    pub binary: PathBuf,
    /// Root under which per-scope workspaces are created
    pub workspace_dir: PathBuf,
    /// Provider registry source, e.g. `IBM-Cloud/ibm`
    pub provider_source: String,
    /// Deadline for a whole mutating request
    pub timeout: Duration,
    /// Deadline for a whole lookup request
    pub lookup_timeout: Duration,
    /// Retry policy for `terraform init`
    pub init_retry: RetryConfig,
}

impl EngineConfig {
    /// Create a config with defaults rooted at `workspace_dir`.
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("terraform"),
            workspace_dir: workspace_dir.into(),
            provider_source: DEFAULT_PROVIDER_SOURCE.to_string(),
            timeout: Duration::from_secs(1800),
            lookup_timeout: Duration::from_secs(300),
            init_retry: RetryConfig::default(),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}
