//! Resource identity and state scope keys

use crate::schema::ResourceSchema;
use crate::types::ParameterSet;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// What addresses a resource: an explicit identifier, a natural key, or both
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    pub id: Option<String>,
    /// Natural key values in schema order, rendered as strings
    pub natural: Vec<(String, String)>,
}

impl Identity {
    /// Derive the identity of a request from its parameters
    pub fn derive(schema: &ResourceSchema, params: &ParameterSet, id: Option<&str>) -> Self {
        let natural = schema
            .identity_keys
            .iter()
            .filter_map(|key| {
                let value = params.get(key).filter(|v| !v.is_null())?;
                Some((key.clone(), render(value)))
            })
            .collect();
        Self {
            id: id.map(str::to_string),
            natural,
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.natural.is_empty()
    }

    /// Key of the isolated engine state this request operates on.
    ///
    /// The natural key wins over the explicit id so that a resource created
    /// by name and later updated by id lands in the same scope. Requests with
    /// no identity at all are scoped by their full parameter set.
    pub fn scope_key(&self, engine_type: &str, params: &ParameterSet) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(engine_type.as_bytes());
        hasher.update(b"\0");
        if !self.natural.is_empty() {
            for (key, value) in &self.natural {
                hasher.update(key.as_bytes());
                hasher.update(b"=");
                hasher.update(value.as_bytes());
                hasher.update(b"\0");
            }
        } else if let Some(id) = &self.id {
            hasher.update(b"id=");
            hasher.update(id.as_bytes());
        } else {
            let mut keys: Vec<&String> = params.keys().collect();
            keys.sort();
            for key in keys {
                hasher.update(key.as_bytes());
                hasher.update(b"=");
                hasher.update(render(&params[key]).as_bytes());
                hasher.update(b"\0");
            }
        }
        hasher.finalize().to_hex().as_str()[..16].to_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .natural
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if let Some(id) = &self.id {
            parts.push(format!("id={id}"));
        }
        if parts.is_empty() {
            f.write_str("(anonymous)")
        } else {
            f.write_str(&parts.join(","))
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::{cluster_schema, unprobed_schema};
    use serde_json::json;

    fn params(value: Value) -> ParameterSet {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_derive_natural_key() {
        let schema = cluster_schema();
        let identity = Identity::derive(&schema, &params(json!({ "name": "c1" })), None);
        assert_eq!(identity.natural, vec![("name".to_string(), "c1".to_string())]);
        assert!(!identity.is_explicit());
        assert_eq!(identity.to_string(), "name=c1");
    }

    #[test]
    fn test_scope_key_prefers_natural_key() {
        let schema = cluster_schema();
        let p = params(json!({ "name": "c1", "hardware": "shared" }));
        let by_name = Identity::derive(&schema, &p, None);
        let by_name_and_id = Identity::derive(&schema, &p, Some("abc"));
        assert_eq!(
            by_name.scope_key("ibm_container_cluster", &p),
            by_name_and_id.scope_key("ibm_container_cluster", &p)
        );
        assert_eq!(by_name.scope_key("ibm_container_cluster", &p).len(), 16);
    }

    #[test]
    fn test_scope_key_differs_by_type_and_identity() {
        let schema = cluster_schema();
        let a = params(json!({ "name": "a" }));
        let b = params(json!({ "name": "b" }));
        let ia = Identity::derive(&schema, &a, None);
        let ib = Identity::derive(&schema, &b, None);
        assert_ne!(ia.scope_key("t", &a), ib.scope_key("t", &b));
        assert_ne!(ia.scope_key("t", &a), ia.scope_key("u", &a));
    }

    #[test]
    fn test_id_only_identity() {
        let schema = cluster_schema();
        let p = ParameterSet::new();
        let identity = Identity::derive(&schema, &p, Some("abc"));
        assert_eq!(identity.to_string(), "id=abc");
        assert_ne!(
            identity.scope_key("t", &p),
            Identity::derive(&schema, &p, Some("xyz")).scope_key("t", &p)
        );
    }

    #[test]
    fn test_anonymous_identity_scoped_by_params() {
        let schema = unprobed_schema();
        let p = params(json!({ "tags": ["x"] }));
        let identity = Identity::derive(&schema, &p, None);
        assert!(identity.is_empty());
        assert_eq!(identity.to_string(), "(anonymous)");
        assert_eq!(identity.scope_key("t", &p), identity.scope_key("t", &p.clone()));
    }

    #[test]
    fn test_non_string_values_rendered_as_json() {
        let schema = unprobed_schema();
        let identity = Identity::derive(&schema, &params(json!({ "speed": 10 })), None);
        assert_eq!(identity.natural, vec![("speed".to_string(), "10".to_string())]);
    }
}
