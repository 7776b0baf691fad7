//! Read-only lookup of current resource state

use crate::engine::{CancelFlag, Engine, EngineError, EngineRequest, ProviderConfig};
use crate::identity::Identity;
use crate::normalize::parse_attributes;
use crate::schema::ResourceSchema;
use crate::types::{Action, EngineInvocationResult, Mode, ParameterSet};

/// Observed state of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    /// The lookup returned the resource's attributes
    Found(ParameterSet),
    /// The lookup completed and matched nothing
    NotFound,
    /// The lookup exited nonzero
    LookupFailed(EngineInvocationResult),
}

/// Everything besides the parameters that an engine call needs
#[derive(Debug, Clone)]
pub struct CallContext {
    pub identity: Identity,
    pub scope_key: String,
    pub provider: ProviderConfig,
    pub cancel: CancelFlag,
}

impl CallContext {
    pub(crate) fn request(
        &self,
        schema: &ResourceSchema,
        mode: Mode,
        action: Option<Action>,
        params: ParameterSet,
    ) -> EngineRequest {
        EngineRequest {
            resource_type: schema.engine_type.clone(),
            mode,
            action,
            params,
            provider_version: schema.provider_version.clone(),
            identity: self.identity.clone(),
            scope_key: self.scope_key.clone(),
            provider: self.provider.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

/// Look a resource up using the lookup subset of `params`.
///
/// Engine errors (timeout, cancellation, spawn failure) are returned as-is.
pub fn probe(
    engine: &dyn Engine,
    schema: &ResourceSchema,
    params: &ParameterSet,
    ctx: &CallContext,
) -> Result<ProbeResult, EngineError> {
    let request = ctx.request(schema, Mode::Lookup, None, schema.lookup_params(params));
    log::info!(
        "Probing {} ({}) scope={}",
        schema.name,
        ctx.identity,
        ctx.scope_key
    );

    let result = engine.invoke(&request)?;
    Ok(interpret(result))
}

/// Classify a completed lookup call
pub fn interpret(result: EngineInvocationResult) -> ProbeResult {
    if !result.is_success() {
        return ProbeResult::LookupFailed(result);
    }
    let attributes = parse_attributes(&result.stdout);
    if attributes.is_empty() {
        ProbeResult::NotFound
    } else {
        ProbeResult::Found(attributes)
    }
}
