//! Schema table - static per-resource-type parameter descriptions
//!
//! A [`ResourceSchema`] is built once from a [`SchemaDef`] (the serde shape of
//! a catalog entry) and is immutable afterwards. [`SchemaTable`] holds every
//! schema known to the process, keyed by name.

use crate::types::ParameterSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Dict => "dict",
        }
    }

    /// Check whether a non-null value has this type.
    ///
    /// Integers are accepted where floats are declared.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Dict => value.is_object(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a JSON value's type, in the same vocabulary as [`ParamType`]
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

// ============================================================================
// Catalog definitions
// ============================================================================

/// A schema entry as written in a catalog file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDef {
    pub name: String,
    #[serde(default)]
    pub engine_type: Option<String>,
    pub provider_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_only: bool,
    #[serde(default)]
    pub required: Vec<(String, ParamType)>,
    #[serde(default)]
    pub fields: BTreeMap<String, ParamType>,
    #[serde(default)]
    pub conflicts: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub defaults: ParameterSet,
    #[serde(default)]
    pub identity: Vec<String>,
    #[serde(default)]
    pub lookup: Option<LookupDef>,
}

/// Lookup section of a catalog entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupDef {
    #[serde(default)]
    pub required: Vec<(String, ParamType)>,
    #[serde(default)]
    pub fields: BTreeMap<String, ParamType>,
}

/// Errors building a schema from its definition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate schema '{0}'")]
    Duplicate(String),

    #[error("schema '{schema}': {section} names undeclared key '{key}'")]
    UnknownKey {
        schema: String,
        section: &'static str,
        key: String,
    },

    #[error("schema '{schema}': key '{key}' declared as both {first} and {second}")]
    TypeMismatch {
        schema: String,
        key: String,
        first: ParamType,
        second: ParamType,
    },

    #[error("schema '{schema}': default for '{key}' is not a {expected}")]
    DefaultType {
        schema: String,
        key: String,
        expected: ParamType,
    },

    #[error("schema '{0}' is data-only but has no lookup section")]
    DataOnlyWithoutLookup(String),
}

// ============================================================================
// Resolved schemas
// ============================================================================

/// Parameter description for read-only lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupSchema {
    pub required_keys: Vec<(String, ParamType)>,
    pub field_types: BTreeMap<String, ParamType>,
}

impl LookupSchema {
    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.field_types.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.field_types.contains_key(key)
    }
}

/// Static description of one resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSchema {
    pub name: String,
    pub engine_type: String,
    pub provider_version: String,
    pub description: String,
    pub data_only: bool,
    pub required_keys: Vec<(String, ParamType)>,
    /// Every mutating key with its declared type
    pub field_types: BTreeMap<String, ParamType>,
    pub conflicts: BTreeMap<String, BTreeSet<String>>,
    pub defaults: ParameterSet,
    pub identity_keys: Vec<String>,
    pub lookup: Option<LookupSchema>,
}

impl ResourceSchema {
    /// Build and check a schema from its catalog definition
    pub fn from_def(def: SchemaDef) -> Result<Self, SchemaError> {
        let name = def.name;
        let field_types = merge_types(&name, &def.required, def.fields)?;

        let lookup = match def.lookup {
            Some(lookup) => Some(LookupSchema {
                field_types: merge_types(&name, &lookup.required, lookup.fields)?,
                required_keys: lookup.required,
            }),
            None if def.data_only => return Err(SchemaError::DataOnlyWithoutLookup(name)),
            None => None,
        };

        let mut conflicts: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (key, partners) in def.conflicts {
            check_declared(&name, "conflicts", &key, &field_types)?;
            for partner in &partners {
                check_declared(&name, "conflicts", partner, &field_types)?;
            }
            conflicts.entry(key).or_default().extend(partners);
        }

        for (key, value) in &def.defaults {
            let expected = field_types
                .get(key)
                .ok_or_else(|| SchemaError::UnknownKey {
                    schema: name.clone(),
                    section: "defaults",
                    key: key.clone(),
                })?;
            if !expected.matches(value) {
                return Err(SchemaError::DefaultType {
                    schema: name.clone(),
                    key: key.clone(),
                    expected: *expected,
                });
            }
        }

        let identity_keys = if def.identity.is_empty() {
            match &lookup {
                Some(l) if !l.required_keys.is_empty() => {
                    l.required_keys.iter().map(|(k, _)| k.clone()).collect()
                }
                _ => def.required.iter().map(|(k, _)| k.clone()).collect(),
            }
        } else {
            for key in &def.identity {
                let known = field_types.contains_key(key)
                    || lookup.as_ref().is_some_and(|l| l.contains(key));
                if !known {
                    return Err(SchemaError::UnknownKey {
                        schema: name.clone(),
                        section: "identity",
                        key: key.clone(),
                    });
                }
            }
            def.identity
        };

        Ok(Self {
            engine_type: def.engine_type.unwrap_or_else(|| name.clone()),
            name,
            provider_version: def.provider_version,
            description: def.description,
            data_only: def.data_only,
            required_keys: def.required,
            field_types,
            conflicts,
            defaults: def.defaults,
            identity_keys,
            lookup,
        })
    }

    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.field_types.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.field_types.contains_key(key)
    }

    /// Parameters passed to a mutating call: the declared key subset with
    /// defaults filled in for absent or null keys.
    pub fn resource_params(&self, params: &ParameterSet) -> ParameterSet {
        let mut subset: ParameterSet = params
            .iter()
            .filter(|(k, v)| self.contains(k) && !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in &self.defaults {
            if !subset.contains_key(key) {
                subset.insert(key.clone(), value.clone());
            }
        }
        subset
    }

    /// Parameters passed to a lookup call. Empty when the schema has no lookup.
    pub fn lookup_params(&self, params: &ParameterSet) -> ParameterSet {
        let Some(lookup) = &self.lookup else {
            return ParameterSet::new();
        };
        params
            .iter()
            .filter(|(k, v)| lookup.contains(k) && !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Submitted keys that no part of the schema declares
    pub fn unknown_keys<'a>(&self, params: &'a ParameterSet) -> Vec<&'a str> {
        params
            .keys()
            .map(String::as_str)
            .filter(|k| {
                !self.contains(k) && !self.lookup.as_ref().is_some_and(|l| l.contains(k))
            })
            .collect()
    }
}

fn merge_types(
    schema: &str,
    required: &[(String, ParamType)],
    mut fields: BTreeMap<String, ParamType>,
) -> Result<BTreeMap<String, ParamType>, SchemaError> {
    for (key, ty) in required {
        match fields.get(key) {
            Some(existing) if existing != ty => {
                return Err(SchemaError::TypeMismatch {
                    schema: schema.to_string(),
                    key: key.clone(),
                    first: *ty,
                    second: *existing,
                });
            }
            Some(_) => {}
            None => {
                fields.insert(key.clone(), *ty);
            }
        }
    }
    Ok(fields)
}

fn check_declared(
    schema: &str,
    section: &'static str,
    key: &str,
    fields: &BTreeMap<String, ParamType>,
) -> Result<(), SchemaError> {
    if fields.contains_key(key) {
        Ok(())
    } else {
        Err(SchemaError::UnknownKey {
            schema: schema.to_string(),
            section,
            key: key.to_string(),
        })
    }
}

// ============================================================================
// Schema table
// ============================================================================

/// All schemas known to the process, keyed by name
#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    schemas: BTreeMap<String, ResourceSchema>,
}

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from definitions, rejecting duplicate names
    pub fn from_defs(defs: impl IntoIterator<Item = SchemaDef>) -> Result<Self, SchemaError> {
        let mut table = Self::new();
        for def in defs {
            let schema = ResourceSchema::from_def(def)?;
            if table.schemas.contains_key(&schema.name) {
                return Err(SchemaError::Duplicate(schema.name));
            }
            table.schemas.insert(schema.name.clone(), schema);
        }
        Ok(table)
    }

    /// Insert a schema, returning the one it replaced
    pub fn insert(&mut self, schema: ResourceSchema) -> Option<ResourceSchema> {
        self.schemas.insert(schema.name.clone(), schema)
    }

    /// Merge another table into this one; later entries replace earlier ones.
    /// Returns the names that were replaced.
    pub fn extend(&mut self, other: SchemaTable) -> Vec<String> {
        let mut replaced = Vec::new();
        for (name, schema) in other.schemas {
            if self.schemas.insert(name.clone(), schema).is_some() {
                replaced.push(name);
            }
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&ResourceSchema> {
        self.schemas.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSchema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    fn types(pairs: &[(&str, ParamType)]) -> BTreeMap<String, ParamType> {
        pairs.iter().map(|(k, t)| ((*k).to_string(), *t)).collect()
    }

    fn req(pairs: &[(&str, ParamType)]) -> Vec<(String, ParamType)> {
        pairs.iter().map(|(k, t)| ((*k).to_string(), *t)).collect()
    }

    pub(crate) fn def(name: &str) -> SchemaDef {
        SchemaDef {
            name: name.to_string(),
            engine_type: None,
            provider_version: "1.23.0".to_string(),
            description: String::new(),
            data_only: false,
            required: Vec::new(),
            fields: BTreeMap::new(),
            conflicts: BTreeMap::new(),
            defaults: ParameterSet::new(),
            identity: Vec::new(),
            lookup: None,
        }
    }

    /// A cluster-like schema with a natural-key lookup
    pub(crate) fn cluster_schema() -> ResourceSchema {
        let mut d = def("test_cluster");
        d.required = req(&[
            ("name", ParamType::Str),
            ("datacenter", ParamType::Str),
            ("hardware", ParamType::Str),
        ]);
        d.fields = types(&[
            ("default_pool_size", ParamType::Int),
            ("tags", ParamType::List),
            ("public_vlan_id", ParamType::Str),
            ("no_subnet", ParamType::Bool),
        ]);
        d.conflicts = BTreeMap::from([
            ("public_vlan_id".to_string(), vec!["no_subnet".to_string()]),
            ("no_subnet".to_string(), vec!["public_vlan_id".to_string()]),
        ]);
        d.defaults = json!({ "default_pool_size": 1 }).as_object().unwrap().clone();
        d.lookup = Some(LookupDef {
            required: Vec::new(),
            fields: types(&[("name", ParamType::Str), ("region", ParamType::Str)]),
        });
        d.identity = vec!["name".to_string()];
        ResourceSchema::from_def(d).unwrap()
    }

    /// A schema with no lookup section
    pub(crate) fn unprobed_schema() -> ResourceSchema {
        let mut d = def("test_vpx");
        d.required = req(&[("speed", ParamType::Int), ("datacenter", ParamType::Str)]);
        d.fields = types(&[("tags", ParamType::List)]);
        ResourceSchema::from_def(d).unwrap()
    }

    #[test]
    fn test_param_type_matches() {
        assert!(ParamType::Str.matches(&json!("x")));
        assert!(ParamType::Int.matches(&json!(4)));
        assert!(!ParamType::Int.matches(&json!(4.5)));
        assert!(ParamType::Float.matches(&json!(4)));
        assert!(ParamType::Bool.matches(&json!(false)));
        assert!(ParamType::List.matches(&json!([])));
        assert!(ParamType::Dict.matches(&json!({})));
        assert!(!ParamType::Str.matches(&json!(1)));
    }

    #[test]
    fn test_required_keys_join_field_types() {
        let schema = cluster_schema();
        assert_eq!(schema.field_types.get("hardware"), Some(&ParamType::Str));
        assert!(schema.contains("default_pool_size"));
        assert_eq!(schema.engine_type, "test_cluster");
    }

    #[test]
    fn test_conflict_with_undeclared_key_rejected() {
        let mut d = def("bad");
        d.fields = types(&[("a", ParamType::Str)]);
        d.conflicts = BTreeMap::from([("a".to_string(), vec!["b".to_string()])]);
        let err = ResourceSchema::from_def(d).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownKey {
                schema: "bad".to_string(),
                section: "conflicts",
                key: "b".to_string()
            }
        );
    }

    #[test]
    fn test_default_type_checked() {
        let mut d = def("bad");
        d.fields = types(&[("size", ParamType::Int)]);
        d.defaults = json!({ "size": "one" }).as_object().unwrap().clone();
        assert!(matches!(
            ResourceSchema::from_def(d),
            Err(SchemaError::DefaultType { .. })
        ));
    }

    #[test]
    fn test_required_type_disagreement_rejected() {
        let mut d = def("bad");
        d.required = req(&[("size", ParamType::Int)]);
        d.fields = types(&[("size", ParamType::Str)]);
        assert!(matches!(
            ResourceSchema::from_def(d),
            Err(SchemaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_data_only_requires_lookup() {
        let mut d = def("info");
        d.data_only = true;
        assert_eq!(
            ResourceSchema::from_def(d),
            Err(SchemaError::DataOnlyWithoutLookup("info".to_string()))
        );
    }

    #[test]
    fn test_identity_defaults() {
        let mut d = def("with_lookup");
        d.required = req(&[("name", ParamType::Str)]);
        d.lookup = Some(LookupDef {
            required: req(&[("domain", ParamType::Str), ("hostname", ParamType::Str)]),
            fields: BTreeMap::new(),
        });
        let schema = ResourceSchema::from_def(d).unwrap();
        assert_eq!(schema.identity_keys, vec!["domain", "hostname"]);

        assert_eq!(unprobed_schema().identity_keys, vec!["speed", "datacenter"]);
    }

    #[test]
    fn test_resource_params_applies_defaults_and_filters() {
        let schema = cluster_schema();
        let params = json!({
            "name": "c1",
            "datacenter": "dal10",
            "hardware": "shared",
            "tags": null,
            "ibmcloud_api_key": "secret",
        });
        let subset = schema.resource_params(params.as_object().unwrap());
        assert_eq!(subset.get("default_pool_size"), Some(&json!(1)));
        assert!(!subset.contains_key("ibmcloud_api_key"));
        assert!(!subset.contains_key("tags"));
        assert_eq!(subset.len(), 4);
    }

    #[test]
    fn test_lookup_params_subset() {
        let schema = cluster_schema();
        let params = json!({ "name": "c1", "datacenter": "dal10" });
        let subset = schema.lookup_params(params.as_object().unwrap());
        assert_eq!(subset.len(), 1);
        assert_eq!(subset.get("name"), Some(&json!("c1")));

        assert!(unprobed_schema().lookup_params(params.as_object().unwrap()).is_empty());
    }

    #[test]
    fn test_unknown_keys() {
        let schema = cluster_schema();
        let params = json!({ "name": "c1", "region": "us-south", "colour": "blue" });
        assert_eq!(schema.unknown_keys(params.as_object().unwrap()), vec!["colour"]);
    }

    #[test]
    fn test_table_rejects_duplicates_and_extend_replaces() {
        let err = SchemaTable::from_defs([def("a"), def("a")]).unwrap_err();
        assert_eq!(err, SchemaError::Duplicate("a".to_string()));

        let mut table = SchemaTable::from_defs([def("a"), def("b")]).unwrap();
        let mut replacement = def("a");
        replacement.provider_version = "2.0.0".to_string();
        let replaced = table.extend(SchemaTable::from_defs([replacement]).unwrap());
        assert_eq!(replaced, vec!["a"]);
        assert_eq!(table.get("a").unwrap().provider_version, "2.0.0");
        assert_eq!(table.len(), 2);
    }
}
