//! Reconciler - decides and performs at most one mutating call per request
//!
//! ```text
//! validate ──▶ probe ──▶ decide ──▶ (create | update | destroy) ──▶ normalize
//!    │           │          │
//!    ▼           ▼          ▼
//!  failure    failure     skip
//! ```

use crate::engine::{CancelFlag, Engine, LookupFailure, PROVIDER_KEYS, ProviderConfig, redact};
use crate::identity::Identity;
use crate::normalize::{error_message, normalize};
use crate::probe::{CallContext, ProbeResult, probe};
use crate::schema::ResourceSchema;
use crate::types::{
    Action, Failure, FailureKind, Intent, Lifecycle, Mode, Outcome, ParameterSet,
};
use crate::validate::{ValidationReport, missing_lookup_keys, validate, validate_lookup};
use serde::Serialize;
use std::fmt;

/// What a request would do
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    /// Nothing to do: the resource is already present (`found`) or already absent
    Skip {
        found: bool,
        attributes: ParameterSet,
    },
    Create,
    Update,
    Destroy,
}

impl Decision {
    pub fn action(&self) -> Option<Action> {
        match self {
            Self::Skip { .. } => None,
            Self::Create => Some(Action::Create),
            Self::Update => Some(Action::Update),
            Self::Destroy => Some(Action::Destroy),
        }
    }

    pub fn is_change(&self) -> bool {
        self.action().is_some()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip { found: true, .. } => f.write_str("unchanged"),
            Self::Skip { found: false, .. } => f.write_str("already absent"),
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
            Self::Destroy => f.write_str("destroy"),
        }
    }
}

/// Scope key of a request, as used by engines to isolate state
pub fn scope_key(schema: &ResourceSchema, params: &ParameterSet, id: Option<&str>) -> String {
    Identity::derive(schema, params, id).scope_key(&schema.engine_type, &schema.resource_params(params))
}

/// Runs the reconciliation protocol against one engine
pub struct Reconciler<'a> {
    engine: &'a dyn Engine,
    provider_keys: Vec<String>,
    provider_defaults: ProviderConfig,
    cancel: CancelFlag,
}

impl<'a> Reconciler<'a> {
    pub fn new(engine: &'a dyn Engine) -> Self {
        Self {
            engine,
            provider_keys: PROVIDER_KEYS.iter().map(|k| (*k).to_string()).collect(),
            provider_defaults: ProviderConfig::new(),
            cancel: CancelFlag::new(),
        }
    }

    /// Override which parameter keys are treated as provider configuration
    #[must_use]
    pub fn with_provider_keys(mut self, keys: Vec<String>) -> Self {
        self.provider_keys = keys;
        self
    }

    /// Provider values used when a request's parameters do not carry them
    #[must_use]
    pub fn with_provider_defaults(mut self, defaults: ProviderConfig) -> Self {
        self.provider_defaults = defaults;
        self
    }

    /// Share a cancellation flag with every engine call made by this reconciler
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Bring a resource to the requested lifecycle state
    pub fn reconcile(&self, schema: &ResourceSchema, params: &ParameterSet, intent: &Intent) -> Outcome {
        if schema.data_only {
            return self.lookup(schema, params);
        }

        let (decision, ctx) = match self.decide(schema, params, intent) {
            Ok(decided) => decided,
            Err(failure) => return failure.into(),
        };

        let action = match decision {
            Decision::Skip { found: true, attributes } => {
                log::info!("{} ({}) already satisfied", schema.name, ctx.identity);
                return Outcome::unchanged(attributes);
            }
            Decision::Skip { found: false, .. } => {
                log::info!("{} ({}) already absent", schema.name, ctx.identity);
                return Outcome::already_absent();
            }
            Decision::Create => Action::Create,
            Decision::Update => Action::Update,
            Decision::Destroy => Action::Destroy,
        };

        self.mutate(schema, params, action, &ctx)
    }

    /// Decide what `reconcile` would do without any mutating call
    pub fn plan(
        &self,
        schema: &ResourceSchema,
        params: &ParameterSet,
        intent: &Intent,
    ) -> Result<Decision, Failure> {
        if schema.data_only {
            return match self.lookup(schema, params) {
                Outcome::Success(s) => Ok(Decision::Skip {
                    found: s.found,
                    attributes: s.attributes,
                }),
                Outcome::Failure(f) => Err(f),
            };
        }
        self.decide(schema, params, intent).map(|(decision, _)| decision)
    }

    /// Read current state without changing anything
    pub fn lookup(&self, schema: &ResourceSchema, params: &ParameterSet) -> Outcome {
        if schema.lookup.is_none() {
            return Outcome::failure(
                FailureKind::ProbeError,
                format!("{} has no lookup schema", schema.name),
            );
        }
        if let Err(report) = validate_lookup(schema, params) {
            return report.into_failure().into();
        }

        let ctx = self.context(schema, params, None);
        match probe(self.engine, schema, params, &ctx) {
            Ok(ProbeResult::Found(attributes)) => Outcome::unchanged(attributes),
            Ok(ProbeResult::NotFound) => Outcome::already_absent(),
            Ok(ProbeResult::LookupFailed(raw)) => normalize(raw),
            Err(e) => Outcome::failure(e.failure_kind(Mode::Lookup), e.to_string()),
        }
    }

    fn decide(
        &self,
        schema: &ResourceSchema,
        params: &ParameterSet,
        intent: &Intent,
    ) -> Result<(Decision, CallContext), Failure> {
        validate_request(schema, params, intent)?;
        self.warn_unknown(schema, params);

        let mut ctx = self.context(schema, params, intent.id.as_deref());

        if !can_probe(schema, params) {
            log::debug!("{} ({}) has nothing to probe by", schema.name, ctx.identity);
            return unprobed_decision(intent).map(|decision| (decision, ctx));
        }

        let observed = match probe(self.engine, schema, params, &ctx) {
            Ok(ProbeResult::Found(attributes)) => Some(attributes),
            Ok(ProbeResult::NotFound) => None,
            Ok(ProbeResult::LookupFailed(raw)) => match self.engine.classify_lookup_failure(&raw) {
                LookupFailure::NoMatch => {
                    log::debug!("{} ({}) lookup matched nothing", schema.name, ctx.identity);
                    None
                }
                LookupFailure::Fatal => {
                    return Err(Failure::new(FailureKind::ProbeError, error_message(&raw)).with_raw(raw));
                }
            },
            Err(e) => {
                return Err(Failure::new(e.failure_kind(Mode::Lookup), e.to_string()));
            }
        };

        let observed_id = observed
            .as_ref()
            .and_then(|attributes| attributes.get("id"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let decision = decide_from_probe(intent, observed);
        // Destroy what the probe found, even if it is not in the engine's state yet.
        if matches!(decision, Decision::Destroy) && ctx.identity.id.is_none() {
            ctx.identity.id = observed_id;
        }
        log::info!("{} ({}): {}", schema.name, ctx.identity, decision);
        Ok((decision, ctx))
    }

    fn mutate(
        &self,
        schema: &ResourceSchema,
        params: &ParameterSet,
        action: Action,
        ctx: &CallContext,
    ) -> Outcome {
        let request = ctx.request(schema, Mode::Resource, Some(action), schema.resource_params(params));
        log::info!(
            "{} {} ({}) scope={}",
            action,
            schema.name,
            ctx.identity,
            ctx.scope_key
        );
        log::debug!(
            "{} parameters: {}",
            schema.name,
            serde_json::Value::Object(redact(&request.params))
        );

        match self.engine.invoke(&request) {
            Ok(result) => normalize(result).with_action(action),
            Err(e) => {
                log::warn!("{action} {} failed: {e}", schema.name);
                Outcome::failure(e.failure_kind(Mode::Resource), e.to_string())
            }
        }
    }

    fn context(&self, schema: &ResourceSchema, params: &ParameterSet, id: Option<&str>) -> CallContext {
        let identity = Identity::derive(schema, params, id);
        CallContext {
            scope_key: identity.scope_key(&schema.engine_type, &schema.resource_params(params)),
            identity,
            provider: self.provider_for(params),
            cancel: self.cancel.clone(),
        }
    }

    /// Provider configuration for a request, its own parameters taking precedence
    pub fn provider_for(&self, params: &ParameterSet) -> ProviderConfig {
        let mut provider = self.provider_defaults.clone();
        for (key, value) in ProviderConfig::from_params(params, &self.provider_keys).iter() {
            provider.insert(key, value);
        }
        provider
    }

    fn warn_unknown(&self, schema: &ResourceSchema, params: &ParameterSet) {
        for key in schema.unknown_keys(params) {
            if !self.provider_keys.iter().any(|k| k == key) {
                log::warn!("{}: ignoring unknown parameter '{key}'", schema.name);
            }
        }
    }
}

/// Every check `reconcile` makes before its first engine call
pub fn validate_request(
    schema: &ResourceSchema,
    params: &ParameterSet,
    intent: &Intent,
) -> Result<(), Failure> {
    if schema.data_only {
        return validate_lookup(schema, params).map_err(ValidationReport::into_failure);
    }
    validate(schema, params, intent.is_new_resource()).map_err(ValidationReport::into_failure)?;
    if !can_probe(schema, params) {
        unprobed_decision(intent)?;
    }
    Ok(())
}

/// Whether `params` carries enough of the lookup keys to probe by
fn can_probe(schema: &ResourceSchema, params: &ParameterSet) -> bool {
    schema.lookup.is_some()
        && !schema.lookup_params(params).is_empty()
        && missing_lookup_keys(schema, params).is_empty()
}

/// Decision for requests that cannot be probed
fn unprobed_decision(intent: &Intent) -> Result<Decision, Failure> {
    match (intent.lifecycle, intent.id.is_some()) {
        (Lifecycle::Present, false) => Ok(Decision::Create),
        (Lifecycle::Present, true) => Ok(Decision::Update),
        (Lifecycle::Absent, true) => Ok(Decision::Destroy),
        (Lifecycle::Absent, false) => Err(ValidationReport {
            missing: vec!["id".to_string()],
            ..Default::default()
        }
        .into_failure()),
    }
}

fn decide_from_probe(intent: &Intent, observed: Option<ParameterSet>) -> Decision {
    let explicit = intent.id.is_some();
    match (intent.lifecycle, observed) {
        (Lifecycle::Present, Some(attributes)) if !explicit => Decision::Skip {
            found: true,
            attributes,
        },
        (Lifecycle::Present, Some(_)) => Decision::Update,
        (Lifecycle::Present, None) if explicit => Decision::Update,
        (Lifecycle::Present, None) => Decision::Create,
        (Lifecycle::Absent, Some(_)) => Decision::Destroy,
        (Lifecycle::Absent, None) => Decision::Skip {
            found: false,
            attributes: ParameterSet::new(),
        },
    }
}
