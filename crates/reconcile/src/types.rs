//! Core types for resource reconciliation

use crate::validate::ValidationReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-supplied parameters for one request, in submission order.
pub type ParameterSet = serde_json::Map<String, serde_json::Value>;

/// Desired lifecycle state of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Resource should exist with the submitted parameters
    #[default]
    #[serde(alias = "available")]
    Present,
    /// Resource should not exist
    Absent,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lifecycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "present" | "available" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(format!(
                "invalid state '{other}': expected present, available or absent"
            )),
        }
    }
}

/// Lifecycle intent plus an optional explicit identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub lifecycle: Lifecycle,
    pub id: Option<String>,
}

impl Intent {
    pub fn present() -> Self {
        Self {
            lifecycle: Lifecycle::Present,
            id: None,
        }
    }

    pub fn absent() -> Self {
        Self {
            lifecycle: Lifecycle::Absent,
            id: None,
        }
    }

    /// Address an existing resource by its engine identifier
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Required keys are only enforced when this request would create new state.
    pub fn is_new_resource(&self) -> bool {
        self.id.is_none() && self.lifecycle == Lifecycle::Present
    }
}

/// Engine invocation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Read-only data-source lookup
    Lookup,
    /// Mutating resource call
    Resource,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Resource => "resource",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutating action requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Destroy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw outcome of one engine call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInvocationResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl EngineInvocationResult {
    /// A successful call with the given stdout payload
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed call with the given exit code and stderr text
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failure taxonomy reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    MissingRequiredParameters,
    ConflictingParameters,
    InvalidParameterType,
    ProbeError,
    EngineInvocationFailed,
    EngineTimeout,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRequiredParameters => "MissingRequiredParameters",
            Self::ConflictingParameters => "ConflictingParameters",
            Self::InvalidParameterType => "InvalidParameterType",
            Self::ProbeError => "ProbeError",
            Self::EngineInvocationFailed => "EngineInvocationFailed",
            Self::EngineTimeout => "EngineTimeout",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether this failure was raised before any engine call
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredParameters
                | Self::ConflictingParameters
                | Self::InvalidParameterType
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful request result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Success {
    /// Whether a mutating call changed remote state
    pub changed: bool,
    /// Mutating action performed, if any
    pub action: Option<Action>,
    /// Whether the resource exists after the request
    pub found: bool,
    /// Resulting resource attributes
    pub attributes: ParameterSet,
}

/// Failed request result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Every validation problem found, for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
    /// Raw engine result, when an engine call produced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<EngineInvocationResult>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            report: None,
            raw: None,
        }
    }

    #[must_use]
    pub fn with_raw(mut self, raw: EngineInvocationResult) -> Self {
        self.raw = Some(raw);
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Final structured result of one request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success(Success),
    Failure(Failure),
}

impl Outcome {
    /// Desired state already satisfied; no mutating call was made
    pub fn unchanged(attributes: ParameterSet) -> Self {
        Self::Success(Success {
            changed: false,
            action: None,
            found: true,
            attributes,
        })
    }

    /// Resource confirmed absent; no mutating call was made
    pub fn already_absent() -> Self {
        Self::Success(Success::default())
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure(Failure::new(kind, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Success(s) if s.changed)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f.kind),
        }
    }

    pub fn attributes(&self) -> Option<&ParameterSet> {
        match self {
            Self::Success(s) => Some(&s.attributes),
            Self::Failure(_) => None,
        }
    }

    /// Record the action that produced a successful outcome
    #[must_use]
    pub fn with_action(self, action: Action) -> Self {
        match self {
            Self::Success(mut s) => {
                s.action = Some(action);
                s.found = action != Action::Destroy;
                Self::Success(s)
            }
            failure @ Self::Failure(_) => failure,
        }
    }
}

impl From<Failure> for Outcome {
    fn from(failure: Failure) -> Self {
        Self::Failure(failure)
    }
}

/// Summary of reconciliation results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ReconcileSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.destroyed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of requests processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged + self.skipped + self.failed
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ReconcileSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.destroyed += other.destroyed;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Failure(_) => self.failed += 1,
            Outcome::Success(s) => match s.action {
                Some(Action::Create) => self.created += 1,
                Some(Action::Update) => self.updated += 1,
                Some(Action::Destroy) => self.destroyed += 1,
                None => self.unchanged += 1,
            },
        }
    }
}

/// Options for batch execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of scope groups run in parallel
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}
