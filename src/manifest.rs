//! Request manifests and command-line parameters.
//!
//! A manifest lists the desired state of many resources:
//!
//! ```toml
//! [[resource]]
//! type = "ibm_container_cluster"
//! name = "web"
//! state = "present"
//!
//! [resource.params]
//! name = "web-cluster"
//! datacenter = "dal10"
//! ```
//!
//! The same structure is accepted as JSON (`{"resource": [...]}`) for files
//! ending in `.json`.

use anyhow::{Context, Result, bail};
use reconcile::{BatchItem, Intent, Lifecycle, ParamType, ParameterSet, ResourceSchema, SchemaTable};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub resource: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Lifecycle,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: ParameterSet,
}

impl ResourceEntry {
    pub fn intent(&self) -> Intent {
        Intent {
            lifecycle: self.state,
            id: self.id.clone(),
        }
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{}.{name}", self.resource_type),
            None => self.resource_type.clone(),
        }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let manifest = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
        .with_context(|| format!("Invalid manifest {}", path.display()))?;
        log::debug!("Loaded {} request(s) from {}", manifest.resource.len(), path.display());
        Ok(manifest)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid JSON format")
    }

    /// Resolve every entry against the catalog.
    ///
    /// Unknown types and repeated `type.name` labels are errors.
    pub fn items<'s>(&self, table: &'s SchemaTable) -> Result<Vec<BatchItem<'s>>> {
        let mut seen = HashSet::new();
        let mut unknown = Vec::new();
        let mut items = Vec::with_capacity(self.resource.len());

        for entry in &self.resource {
            let Some(schema) = table.get(&entry.resource_type) else {
                unknown.push(entry.resource_type.clone());
                continue;
            };
            if entry.name.is_some() && !seen.insert(entry.label()) {
                bail!("Duplicate resource '{}' in manifest", entry.label());
            }
            items.push(BatchItem {
                schema,
                name: entry.name.clone(),
                params: entry.params.clone(),
                intent: entry.intent(),
            });
        }

        if !unknown.is_empty() {
            unknown.sort();
            unknown.dedup();
            bail!(
                "Unknown resource type(s): {} (see `cloudstate schemas list`)",
                unknown.join(", ")
            );
        }
        Ok(items)
    }
}

/// Parse a `key=value` argument.
///
/// The value is read as JSON when it parses, otherwise kept as a string. A key
/// the schema declares as `str` always keeps the raw text.
pub fn parse_param(arg: &str, schema: Option<&ResourceSchema>) -> Result<(String, Value)> {
    let Some((key, raw)) = arg.split_once('=') else {
        bail!("Invalid parameter '{arg}': expected key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid parameter '{arg}': empty key");
    }

    let declared = schema.and_then(|s| {
        s.field_types
            .get(key)
            .or_else(|| s.lookup.as_ref().and_then(|l| l.field_types.get(key)))
    });

    let value = match (declared, serde_json::from_str::<Value>(raw)) {
        (Some(ParamType::Str), Ok(Value::String(s))) => Value::String(s),
        (Some(ParamType::Str), _) => Value::String(raw.to_string()),
        (_, Ok(value)) => value,
        (_, Err(_)) => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

/// Parse every `key=value` argument into a parameter set; later keys win.
pub fn parse_params(args: &[String], schema: Option<&ResourceSchema>) -> Result<ParameterSet> {
    let mut params = ParameterSet::new();
    for arg in args {
        let (key, value) = parse_param(arg, schema)?;
        params.insert(key, value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use serde_json::json;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[[resource]]
type = "ibm_container_cluster"
name = "web"

[resource.params]
name = "web-cluster"
datacenter = "dal10"
workers = 3

[[resource]]
type = "ibm_lb_vpx"
name = "old"
state = "absent"
id = "12345"
"#;

    #[test]
    fn test_parse_toml_manifest() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        assert_eq!(manifest.resource.len(), 2);

        let web = &manifest.resource[0];
        assert_eq!(web.state, Lifecycle::Present);
        assert_eq!(web.params["workers"], json!(3));

        let old = &manifest.resource[1];
        assert_eq!(old.intent(), Intent::absent().with_id("12345"));
        assert!(old.params.is_empty());
    }

    #[test]
    fn test_parse_json_manifest_with_available_alias() {
        let manifest = Manifest::from_json(
            r#"{"resource": [{"type": "ibm_database_info", "state": "available", "params": {"name": "db"}}]}"#,
        )
        .unwrap();
        assert_eq!(manifest.resource[0].state, Lifecycle::Present);
    }

    #[test]
    fn test_load_by_extension() {
        let temp = TempDir::new().unwrap();
        let json_path = temp.path().join("m.json");
        fs::write(&json_path, r#"{"resource": [{"type": "ibm_lb_vpx"}]}"#).unwrap();
        assert_eq!(Manifest::load(&json_path).unwrap().resource.len(), 1);

        let toml_path = temp.path().join("m.toml");
        fs::write(&toml_path, MANIFEST).unwrap();
        assert_eq!(Manifest::load(&toml_path).unwrap().resource.len(), 2);
    }

    #[test]
    fn test_unknown_field_is_error() {
        let err = Manifest::from_toml("[[resource]]\ntype = \"x\"\nlifecycle = \"present\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("lifecycle"));
    }

    #[test]
    fn test_items_resolve_schemas() {
        let table = catalog::builtin().unwrap();
        let items = Manifest::from_toml(MANIFEST).unwrap().items(&table).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label(), "ibm_container_cluster.web");
        assert_eq!(items[1].intent.id.as_deref(), Some("12345"));
    }

    #[test]
    fn test_items_unknown_type() {
        let table = catalog::builtin().unwrap();
        let manifest = Manifest::from_toml("[[resource]]\ntype = \"ibm_nope\"\n").unwrap();
        let err = manifest.items(&table).unwrap_err();
        assert!(err.to_string().contains("ibm_nope"));
    }

    #[test]
    fn test_items_duplicate_label() {
        let table = catalog::builtin().unwrap();
        let manifest = Manifest::from_toml(
            "[[resource]]\ntype = \"ibm_lb_vpx\"\nname = \"a\"\n\n[[resource]]\ntype = \"ibm_lb_vpx\"\nname = \"a\"\n",
        )
        .unwrap();
        assert!(manifest.items(&table).unwrap_err().to_string().contains("Duplicate"));
    }

    #[test]
    fn test_parse_param_json_and_string() {
        assert_eq!(parse_param("count=3", None).unwrap(), ("count".to_string(), json!(3)));
        assert_eq!(parse_param("flag=true", None).unwrap().1, json!(true));
        assert_eq!(parse_param("tags=[\"a\",\"b\"]", None).unwrap().1, json!(["a", "b"]));
        assert_eq!(parse_param("name=web", None).unwrap().1, json!("web"));
        assert_eq!(parse_param("note=a=b", None).unwrap().1, json!("a=b"));
    }

    #[test]
    fn test_parse_param_keeps_declared_strings() {
        let table = catalog::builtin().unwrap();
        let bm = table.get("ibm_compute_bare_metal").unwrap();
        assert_eq!(parse_param("hostname=123", Some(bm)).unwrap().1, json!("123"));
        assert_eq!(parse_param("memory=64", Some(bm)).unwrap().1, json!(64));
    }

    #[test]
    fn test_parse_param_errors() {
        assert!(parse_param("novalue", None).is_err());
        assert!(parse_param("=value", None).is_err());
    }

    #[test]
    fn test_parse_params_later_wins() {
        let params = parse_params(&["a=1".to_string(), "a=2".to_string()], None).unwrap();
        assert_eq!(params["a"], json!(2));
    }
}
