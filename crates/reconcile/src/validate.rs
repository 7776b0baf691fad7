//! Parameter validation against a schema
//!
//! Validation is pure: no I/O, deterministic for identical inputs, and it
//! collects every problem instead of stopping at the first.

use crate::schema::{ParamType, ResourceSchema, value_type_name};
use crate::types::{Failure, FailureKind, ParameterSet};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Result of validating a parameter set
pub type ValidationResult = Result<(), ValidationReport>;

/// A value whose type does not match its declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMismatch {
    pub key: String,
    pub expected: ParamType,
    pub found: &'static str,
}

/// Every problem found in one parameter set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub missing: Vec<String>,
    pub conflicts: Vec<(String, String)>,
    pub invalid_types: Vec<TypeMismatch>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.conflicts.is_empty() && self.invalid_types.is_empty()
    }

    /// Failure kind of the most fundamental problem present
    pub fn kind(&self) -> FailureKind {
        if !self.missing.is_empty() {
            FailureKind::MissingRequiredParameters
        } else if !self.conflicts.is_empty() {
            FailureKind::ConflictingParameters
        } else {
            FailureKind::InvalidParameterType
        }
    }

    pub fn message(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "missing required arguments: {}",
                self.missing.join(", ")
            ));
        }
        if !self.conflicts.is_empty() {
            let pairs: Vec<String> = self
                .conflicts
                .iter()
                .map(|(a, b)| format!("{a}/{b}"))
                .collect();
            parts.push(format!("conflicts exist: {}", pairs.join(", ")));
        }
        if !self.invalid_types.is_empty() {
            let mismatches: Vec<String> = self
                .invalid_types
                .iter()
                .map(|m| format!("{} (expected {}, got {})", m.key, m.expected, m.found))
                .collect();
            parts.push(format!("invalid parameter types: {}", mismatches.join(", ")));
        }
        parts.join("; ")
    }

    pub fn into_failure(self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.message(),
            report: Some(self),
            raw: None,
        }
    }

    fn into_result(self) -> ValidationResult {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Truthiness used for conflict detection
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Validate parameters for a mutating request.
///
/// Required keys are only enforced when `is_new_resource` is true. Lookup-only
/// keys are type-checked too, since they decide what the probe matches.
pub fn validate(
    schema: &ResourceSchema,
    params: &ParameterSet,
    is_new_resource: bool,
) -> ValidationResult {
    let missing = if is_new_resource {
        missing_keys(&schema.required_keys, params)
    } else {
        Vec::new()
    };

    let mut invalid_types = type_mismatches(&schema.field_types, params);
    if let Some(lookup) = &schema.lookup {
        invalid_types.extend(
            type_mismatches(&lookup.field_types, params)
                .into_iter()
                .filter(|m| !schema.contains(&m.key)),
        );
    }

    ValidationReport {
        missing,
        conflicts: conflicting_pairs(&schema.conflicts, params),
        invalid_types,
    }
    .into_result()
}

/// Validate parameters for a read-only lookup
pub fn validate_lookup(schema: &ResourceSchema, params: &ParameterSet) -> ValidationResult {
    let Some(lookup) = &schema.lookup else {
        return Ok(());
    };
    ValidationReport {
        missing: missing_keys(&lookup.required_keys, params),
        conflicts: Vec::new(),
        invalid_types: type_mismatches(&lookup.field_types, params),
    }
    .into_result()
}

/// Lookup-required keys absent from `params`
pub fn missing_lookup_keys(schema: &ResourceSchema, params: &ParameterSet) -> Vec<String> {
    schema
        .lookup
        .as_ref()
        .map(|lookup| missing_keys(&lookup.required_keys, params))
        .unwrap_or_default()
}

fn missing_keys(required: &[(String, ParamType)], params: &ParameterSet) -> Vec<String> {
    required
        .iter()
        .filter(|(key, _)| params.get(key).is_none_or(Value::is_null))
        .map(|(key, _)| key.clone())
        .collect()
}

fn conflicting_pairs(
    conflicts: &BTreeMap<String, BTreeSet<String>>,
    params: &ParameterSet,
) -> Vec<(String, String)> {
    let truthy = |key: &str| params.get(key).is_some_and(is_truthy);
    let mut pairs = BTreeSet::new();

    for (key, partners) in conflicts {
        if !truthy(key) {
            continue;
        }
        for partner in partners {
            if partner != key && truthy(partner) {
                let pair = if key < partner {
                    (key.clone(), partner.clone())
                } else {
                    (partner.clone(), key.clone())
                };
                pairs.insert(pair);
            }
        }
    }

    pairs.into_iter().collect()
}

fn type_mismatches(
    field_types: &BTreeMap<String, ParamType>,
    params: &ParameterSet,
) -> Vec<TypeMismatch> {
    params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .filter_map(|(key, value)| {
            let expected = field_types.get(key)?;
            (!expected.matches(value)).then(|| TypeMismatch {
                key: key.clone(),
                expected: *expected,
                found: value_type_name(value),
            })
        })
        .collect()
}
