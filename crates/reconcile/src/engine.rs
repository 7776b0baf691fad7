//! Provisioning engine boundary
//!
//! The core never provisions anything itself. It hands an [`EngineRequest`] to
//! an [`Engine`] and receives an [`EngineInvocationResult`] back. Engines that
//! cannot complete a call at all (deadline, cancellation, failure to start)
//! return an [`EngineError`] instead.

use crate::identity::Identity;
use crate::types::{Action, EngineInvocationResult, FailureKind, Mode, ParameterSet};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Credential keys split out of a parameter set into [`ProviderConfig`]
pub const PROVIDER_KEYS: &[&str] = &[
    "ibmcloud_api_key",
    "iaas_classic_username",
    "iaas_classic_api_key",
    "region",
    "zone",
];

/// Keys whose values are never logged
pub const SECRET_KEYS: &[&str] = &[
    "ibmcloud_api_key",
    "iaas_classic_username",
    "iaas_classic_api_key",
];

/// Copy of a parameter set with secret values masked, for logging
pub fn redact(params: &ParameterSet) -> ParameterSet {
    params
        .iter()
        .map(|(k, v)| {
            if SECRET_KEYS.contains(&k.as_str()) {
                (k.clone(), serde_json::Value::String("***".to_string()))
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// Resolved provider credentials and location
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    values: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the given provider keys from a parameter set
    pub fn from_params(params: &ParameterSet, keys: &[String]) -> Self {
        let values = keys
            .iter()
            .filter_map(|key| {
                let value = match params.get(key)? {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), value))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if SECRET_KEYS.contains(&key.as_str()) {
                map.entry(key, &"***");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// Shared cancellation flag polled by engines while a call is in flight
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One call to the provisioning engine
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Engine resource type
    pub resource_type: String,
    pub mode: Mode,
    /// Mutating action; `None` for lookups
    pub action: Option<Action>,
    pub params: ParameterSet,
    pub provider_version: String,
    pub identity: Identity,
    /// Isolated state scope for this call
    pub scope_key: String,
    pub provider: ProviderConfig,
    pub cancel: CancelFlag,
}

/// How an engine reads a nonzero lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailure {
    /// The engine reported that nothing matched the lookup
    NoMatch,
    /// The lookup could not determine anything (auth, transport, config)
    Fatal,
}

/// Errors that prevent an engine call from completing
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("engine call cancelled")]
    Cancelled,

    #[error("failed to start engine: {0}")]
    Spawn(String),

    #[error("failed to prepare engine workspace: {0}")]
    Workspace(String),
}

impl EngineError {
    /// Failure kind reported for this error during the given mode
    pub fn failure_kind(&self, mode: Mode) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::EngineTimeout,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Spawn(_) | Self::Workspace(_) => match mode {
                Mode::Lookup => FailureKind::ProbeError,
                Mode::Resource => FailureKind::EngineInvocationFailed,
            },
        }
    }
}

/// A provisioning engine
pub trait Engine: Send + Sync {
    /// Run one call and return its raw result
    fn invoke(&self, request: &EngineRequest) -> Result<EngineInvocationResult, EngineError>;

    /// Decide whether a failed lookup means "nothing matched"
    fn classify_lookup_failure(&self, result: &EngineInvocationResult) -> LookupFailure;
}

impl<E: Engine + ?Sized> Engine for &E {
    fn invoke(&self, request: &EngineRequest) -> Result<EngineInvocationResult, EngineError> {
        (**self).invoke(request)
    }

    fn classify_lookup_failure(&self, result: &EngineInvocationResult) -> LookupFailure {
        (**self).classify_lookup_failure(result)
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn invoke(&self, request: &EngineRequest) -> Result<EngineInvocationResult, EngineError> {
        (**self).invoke(request)
    }

    fn classify_lookup_failure(&self, result: &EngineInvocationResult) -> LookupFailure {
        (**self).classify_lookup_failure(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted engine that records every request it receives
    #[derive(Default)]
    pub(crate) struct ScriptedEngine {
        responses: Mutex<VecDeque<Result<EngineInvocationResult, EngineError>>>,
        pub(crate) calls: Mutex<Vec<EngineRequest>>,
    }

    impl ScriptedEngine {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(self, result: EngineInvocationResult) -> Self {
            self.responses.lock().unwrap().push_back(Ok(result));
            self
        }

        pub(crate) fn fail(self, error: EngineError) -> Self {
            self.responses.lock().unwrap().push_back(Err(error));
            self
        }

        pub(crate) fn calls(&self) -> Vec<EngineRequest> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn mutating_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| c.mode == Mode::Resource)
                .count()
        }
    }

    impl Engine for ScriptedEngine {
        fn invoke(&self, request: &EngineRequest) -> Result<EngineInvocationResult, EngineError> {
            self.calls.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(EngineInvocationResult::success("{}")))
        }

        fn classify_lookup_failure(&self, result: &EngineInvocationResult) -> LookupFailure {
            if result.stderr.contains("no matching") {
                LookupFailure::NoMatch
            } else {
                LookupFailure::Fatal
            }
        }
    }

    #[test]
    fn test_redact_masks_secrets_only() {
        let params = json!({ "ibmcloud_api_key": "k", "region": "us-south", "name": "x" });
        let redacted = redact(params.as_object().unwrap());
        assert_eq!(redacted["ibmcloud_api_key"], "***");
        assert_eq!(redacted["region"], "us-south");
        assert_eq!(redacted["name"], "x");
    }

    #[test]
    fn test_provider_config_debug_hides_secrets() {
        let params = json!({ "ibmcloud_api_key": "topsecret", "region": "eu-de", "zone": null });
        let keys: Vec<String> = PROVIDER_KEYS.iter().map(|k| (*k).to_string()).collect();
        let provider = ProviderConfig::from_params(params.as_object().unwrap(), &keys);
        assert_eq!(provider.get("ibmcloud_api_key"), Some("topsecret"));
        assert_eq!(provider.get("zone"), None);
        let debug = format!("{provider:?}");
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("eu-de"));
    }

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_engine_error_kinds() {
        assert_eq!(
            EngineError::Timeout(Duration::from_secs(5)).failure_kind(Mode::Lookup),
            FailureKind::EngineTimeout
        );
        assert_eq!(
            EngineError::Cancelled.failure_kind(Mode::Resource),
            FailureKind::Cancelled
        );
        assert_eq!(
            EngineError::Spawn("x".into()).failure_kind(Mode::Lookup),
            FailureKind::ProbeError
        );
        assert_eq!(
            EngineError::Workspace("x".into()).failure_kind(Mode::Resource),
            FailureKind::EngineInvocationFailed
        );
    }
}
