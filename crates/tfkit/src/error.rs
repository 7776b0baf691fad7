//! Error types for Terraform operations.
//!
//! Failed `terraform` steps are categorized from their stderr so that init
//! can retry transient failures and lookups can tell "nothing matched" apart
//! from "could not ask".

use reconcile::EngineInvocationResult;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Categories of Terraform errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Registry, provider download or API connectivity failure (transient, retryable)
    Network,
    /// The queried object does not exist
    NotFound,
    /// Rejected credentials or missing permissions
    Auth,
    /// Account quota or capacity limit reached
    Quota,
    /// The object already exists or is locked by another operation
    Conflict,
    /// A provider-side wait expired
    Timeout,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Categorize Terraform stderr.
    pub fn from_stderr(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        let any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if any(&[
            "unauthorized",
            "forbidden",
            "status code: 401",
            "status code: 403",
            "invalid api key",
            "api key could not be found",
            "provided api key",
            "iam token",
            "not authorized",
        ]) {
            return Self::Auth;
        }

        if any(&[
            "could not resolve host",
            "no such host",
            "connection refused",
            "connection reset",
            "tls handshake timeout",
            "i/o timeout",
            "failed to query available provider packages",
            "could not connect to registry",
            "error while installing",
            "network is unreachable",
        ]) {
            return Self::Network;
        }

        if any(&[
            "no matching",
            "not found",
            "could not find",
            "does not exist",
            "status code: 404",
            "no resource found",
            "returned no results",
        ]) {
            return Self::NotFound;
        }

        if any(&["quota", "limit exceeded", "insufficient capacity", "exceeds the limit"]) {
            return Self::Quota;
        }

        if any(&["already exists", "conflict", "status code: 409", "error acquiring the state lock"]) {
            return Self::Conflict;
        }

        if any(&["timeout while waiting", "context deadline exceeded", "timed out"]) {
            return Self::Timeout;
        }

        Self::Other
    }

    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Resource not found",
            Self::Auth => "Authentication failed",
            Self::Quota => "Quota exceeded",
            Self::Conflict => "Resource conflict",
            Self::Timeout => "Provider operation timed out",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check connectivity to the Terraform registry and IBM Cloud APIs",
            Self::NotFound => "Verify the identifying parameters of the resource",
            Self::Auth => "Check ibmcloud_api_key (or IC_API_KEY) and its access policies",
            Self::Quota => "Free capacity or request a quota increase for the account",
            Self::Conflict => "Wait for concurrent operations to finish or adopt the existing resource by id",
            Self::Timeout => "Retry later; the resource may still be provisioning",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors that can occur while driving Terraform.
#[derive(Debug, Error)]
pub enum Error {
    /// Terraform binary is not installed or not on PATH
    #[error("terraform not found: {0}")]
    TerraformNotFound(String),

    /// The terraform process could not be started
    #[error("failed to run terraform: {0}")]
    Spawn(#[source] std::io::Error),

    /// A terraform step exited nonzero
    #[error("terraform {step} failed ({category}): {message}")]
    Command {
        /// Subcommand that failed
        step: String,
        /// Category derived from stderr
        category: ErrorCategory,
        /// Extracted diagnostic
        message: String,
        /// Raw result of the failed step
        output: EngineInvocationResult,
    },

    /// The request deadline passed
    #[error("terraform timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The request was cancelled
    #[error("terraform cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an error from the output of a failed terraform step.
    pub fn from_terraform_output(step: &str, output: EngineInvocationResult) -> Self {
        let category = ErrorCategory::from_stderr(&output.stderr);
        let message = reconcile::extract_diagnostic(&output.stderr)
            .unwrap_or_else(|| output.stderr.trim().to_string());
        Self::Command {
            step: step.to_string(),
            category,
            message,
            output,
        }
    }

    /// Terraform subcommand that failed, for step failures.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Command { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Command { category, .. } => *category,
            Self::Timeout(_) => ErrorCategory::Timeout,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for Terraform operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_network() {
        let stderr = "Error: Failed to query available provider packages\n\nCould not retrieve the list of available versions: could not connect to registry.terraform.io";
        assert_eq!(ErrorCategory::from_stderr(stderr), ErrorCategory::Network);
        assert!(ErrorCategory::Network.is_retryable());
    }

    #[test]
    fn test_categorize_auth_before_not_found() {
        let stderr = "Error: BXEVC: The provided API key could not be found";
        assert_eq!(ErrorCategory::from_stderr(stderr), ErrorCategory::Auth);
        assert!(!ErrorCategory::Auth.is_retryable());
    }

    #[test]
    fn test_categorize_not_found() {
        for stderr in [
            "Error: No matching cluster found",
            "Error: [ERROR] Error retrieving virtual guest: SoftLayer_Exception_ObjectNotFound: Unable to find object (not found)",
            "Error: Resource does not exist",
            "Error: request failed with status code: 404",
        ] {
            assert_eq!(ErrorCategory::from_stderr(stderr), ErrorCategory::NotFound, "{stderr}");
        }
    }

    #[test]
    fn test_categorize_other_kinds() {
        assert_eq!(
            ErrorCategory::from_stderr("Error: Quota exceeded for bare metal servers"),
            ErrorCategory::Quota
        );
        assert_eq!(
            ErrorCategory::from_stderr("Error: cluster name already exists"),
            ErrorCategory::Conflict
        );
        assert_eq!(
            ErrorCategory::from_stderr("Error: timeout while waiting for state to become 'normal'"),
            ErrorCategory::Timeout
        );
        assert_eq!(ErrorCategory::from_stderr("Error: boom"), ErrorCategory::Other);
    }

    #[test]
    fn test_from_terraform_output() {
        let output = EngineInvocationResult::failure(1, "Error: quota exceeded\n");
        let err = Error::from_terraform_output("apply", output);
        assert_eq!(err.category(), ErrorCategory::Quota);
        assert_eq!(err.to_string(), "terraform apply failed (Quota exceeded): quota exceeded");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unrecognized_stderr_kept_raw() {
        let err = Error::from_terraform_output("init", EngineInvocationResult::failure(1, "  segfault  "));
        match err {
            Error::Command { message, .. } => assert_eq!(message, "segfault"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
