//! # Reconcile
//!
//! A declarative resource reconciliation protocol over an external
//! provisioning engine.
//!
//! Callers declare the desired state of a resource as a flat parameter set
//! plus a lifecycle intent. The protocol validates the parameters against a
//! static schema, probes the engine for current state, decides whether a
//! create, update, destroy or nothing is needed, and invokes the engine at
//! most once to make the change.
//!
//! ## Core Concepts
//!
//! - **ResourceSchema**: Required keys, full key set, types and conflict map of a resource type
//! - **Validator**: Reports every missing, conflicting and mistyped parameter before any engine call
//! - **Probe**: Read-only lookup of current state
//! - **Reconciler**: The decision table; issues zero or one mutating call
//! - **Normalizer**: Maps raw engine output to a structured [`Outcome`]
//! - **Executor**: Runs many requests, serialized per state scope
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{Intent, Reconciler, SchemaTable};
//!
//! let table = SchemaTable::from_defs(defs)?;
//! let schema = table.get("ibm_container_cluster").unwrap();
//!
//! let reconciler = Reconciler::new(&engine);
//! let outcome = reconciler.reconcile(schema, &params, &Intent::present());
//! ```
//!
//! ## Engines
//!
//! The crate has no process or filesystem I/O. Provisioning is delegated to
//! an [`Engine`], which also decides whether a failed lookup means "nothing
//! matched" or "could not determine" via [`Engine::classify_lookup_failure`].

pub mod context;
pub mod engine;
pub mod executor;
pub mod identity;
pub mod normalize;
pub mod planner;
pub mod probe;
pub mod reconciler;
pub mod schema;
pub mod types;
pub mod validate;

// Re-export main types at crate root
pub use context::{LogProgress, NoProgress, ProgressCallback};
pub use engine::{
    CancelFlag, Engine, EngineError, EngineRequest, LookupFailure, PROVIDER_KEYS,
    ProviderConfig, SECRET_KEYS, redact,
};
pub use executor::{
    BatchError, BatchItem, BatchReport, execute, filter_by_targets, group_by_scope, plan_all,
};
pub use identity::Identity;
pub use normalize::{extract_diagnostic, normalize};
pub use planner::Target;
pub use probe::{CallContext, ProbeResult, probe};
pub use reconciler::{Decision, Reconciler, scope_key, validate_request};
pub use schema::{LookupDef, LookupSchema, ParamType, ResourceSchema, SchemaDef, SchemaError, SchemaTable};
pub use types::{
    Action, EngineInvocationResult, ExecuteOptions, Failure, FailureKind, Intent, Lifecycle,
    Mode, Outcome, ParameterSet, ReconcileSummary, Success,
};
pub use validate::{
    ValidationReport, ValidationResult, missing_lookup_keys, validate, validate_lookup,
};
