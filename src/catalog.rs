//! Schema catalogs: the built-in IBM Cloud catalog plus user catalog files.

use anyhow::{Context, Result};
use reconcile::{SchemaDef, SchemaTable};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Catalog compiled into the binary
pub const BUILTIN: &str = include_str!("../schemas/ibm.toml");

/// Name reported for the built-in catalog
pub const BUILTIN_SOURCE: &str = "<built-in>";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    schema: Vec<SchemaDef>,
}

/// A loaded table and where its entries came from
#[derive(Debug)]
pub struct Catalog {
    pub table: SchemaTable,
    pub sources: Vec<String>,
}

/// Parse one catalog document
pub fn parse(content: &str, source: &str) -> Result<SchemaTable> {
    let file: CatalogFile =
        toml::from_str(content).with_context(|| format!("Invalid catalog format in {source}"))?;
    SchemaTable::from_defs(file.schema).with_context(|| format!("Invalid catalog {source}"))
}

pub fn builtin() -> Result<SchemaTable> {
    parse(BUILTIN, BUILTIN_SOURCE)
}

/// `*.toml` files directly under `dir`, sorted by name
pub fn catalog_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect()
}

/// Load the built-in catalog, then every user catalog in order.
///
/// A user schema with the name of an already loaded one replaces it.
pub fn load(user_dir: Option<&Path>, extra: &[PathBuf]) -> Result<Catalog> {
    let mut table = builtin()?;
    let mut sources = vec![BUILTIN_SOURCE.to_string()];

    let files = user_dir.map(catalog_files).unwrap_or_default();
    for path in files.iter().chain(extra) {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read catalog {}", path.display()))?;
        let source = path.display().to_string();
        let user = parse(&content, &source)?;
        log::debug!("Loaded {} schema(s) from {source}", user.len());
        for name in table.extend(user) {
            log::info!("Schema '{name}' replaced by {source}");
        }
        sources.push(source);
    }

    Ok(Catalog { table, sources })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ParamType;
    use tempfile::TempDir;

    const EXTRA: &str = r#"
[[schema]]
name = "ibm_container_cluster"
provider_version = "1.30.0"
required = [["name", "str"]]

[[schema]]
name = "ibm_is_vpc"
provider_version = "1.60.0"
required = [["name", "str"]]
fields = { resource_group = "str", tags = "list" }

[schema.lookup]
required = [["name", "str"]]
"#;

    #[test]
    fn test_builtin_catalog_loads() {
        let table = builtin().unwrap();
        assert_eq!(table.len(), 9);
        for name in [
            "ibm_compute_bare_metal",
            "ibm_compute_vm_instance",
            "ibm_cis_cache_settings",
            "ibm_container_cluster",
            "ibm_container_alb_cert",
            "ibm_is_lb_listener_policy",
            "ibm_lb_vpx",
            "ibm_container_cluster_info",
            "ibm_database_info",
        ] {
            assert!(table.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn test_builtin_cluster_schema() {
        let table = builtin().unwrap();
        let cluster = table.get("ibm_container_cluster").unwrap();
        assert_eq!(cluster.provider_version, "1.23.0");
        assert!(cluster.required_keys.iter().any(|(k, _)| k == "name"));
        assert_eq!(cluster.identity_keys, vec!["name".to_string()]);
        assert!(cluster.lookup.as_ref().is_some_and(|l| l.contains("region")));
    }

    #[test]
    fn test_builtin_info_schemas_are_data_only() {
        let table = builtin().unwrap();
        let info = table.get("ibm_container_cluster_info").unwrap();
        assert!(info.data_only);
        assert_eq!(info.engine_type, "ibm_container_cluster");
        let db = table.get("ibm_database_info").unwrap();
        assert_eq!(db.engine_type, "ibm_database");
    }

    #[test]
    fn test_builtin_conflicts_are_symmetric() {
        let table = builtin().unwrap();
        let bm = table.get("ibm_compute_bare_metal").unwrap();
        assert!(bm.conflicts["image_template_id"].contains("os_reference_code"));
        assert!(bm.conflicts["os_reference_code"].contains("image_template_id"));
        assert_eq!(bm.field_types["image_template_id"], ParamType::Int);
    }

    #[test]
    fn test_user_catalog_replaces_and_extends() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("extra.toml"), EXTRA).unwrap();
        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let catalog = load(Some(temp.path()), &[]).unwrap();
        assert_eq!(catalog.table.len(), 10);
        assert_eq!(
            catalog.table.get("ibm_container_cluster").unwrap().provider_version,
            "1.30.0"
        );
        assert!(catalog.table.get("ibm_is_vpc").is_some());
        assert_eq!(catalog.sources.len(), 2);
    }

    #[test]
    fn test_missing_user_dir_is_fine() {
        let catalog = load(Some(Path::new("/nonexistent/schemas")), &[]).unwrap();
        assert_eq!(catalog.table.len(), 9);
    }

    #[test]
    fn test_invalid_catalog_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        fs::write(
            &path,
            r#"
[[schema]]
name = "broken"
provider_version = "1.0.0"
required = [["name", "str"]]
conflicts = { name = ["nope"] }
"#,
        )
        .unwrap();
        let err = load(None, &[path]).unwrap_err();
        assert!(format!("{err:#}").contains("nope"));
    }

    #[test]
    fn test_unknown_type_name_is_error() {
        let err = parse(
            "[[schema]]\nname = \"x\"\nprovider_version = \"1\"\nrequired = [[\"a\", \"string\"]]\n",
            "test",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Invalid catalog format"));
    }
}
