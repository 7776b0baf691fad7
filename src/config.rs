//! User configuration (`<config_dir>/config.toml`)

use anyhow::{Context, Result, bail};
use reconcile::{ParameterSet, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tfkit::{EngineConfig, RetryConfig};

use crate::paths;

/// Region used when nothing else names one
pub const DEFAULT_REGION: &str = "us-south";

/// Provider keys and the environment variables they fall back to
const CREDENTIAL_ENV: &[(&str, &str)] = &[
    ("ibmcloud_api_key", "IC_API_KEY"),
    ("iaas_classic_username", "IAAS_CLASSIC_USERNAME"),
    ("iaas_classic_api_key", "IAAS_CLASSIC_API_KEY"),
    ("region", "IC_REGION"),
    ("zone", "IC_ZONE"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub credentials: Credentials,
    pub catalog: CatalogSection,
    pub apply: ApplySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub binary: String,
    pub timeout_secs: u64,
    pub lookup_timeout_secs: u64,
    pub provider_source: String,
    /// Defaults to `<state_dir>/workspaces`
    pub workspace_dir: Option<String>,
    pub init_retries: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            timeout_secs: 1800,
            lookup_timeout_secs: 300,
            provider_source: tfkit::DEFAULT_PROVIDER_SOURCE.to_string(),
            workspace_dir: None,
            init_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Credentials {
    pub ibmcloud_api_key: Option<String>,
    pub iaas_classic_username: Option<String>,
    pub iaas_classic_api_key: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
}

impl Credentials {
    fn get(&self, key: &str) -> Option<&str> {
        match key {
            "ibmcloud_api_key" => self.ibmcloud_api_key.as_deref(),
            "iaas_classic_username" => self.iaas_classic_username.as_deref(),
            "iaas_classic_api_key" => self.iaas_classic_api_key.as_deref(),
            "region" => self.region.as_deref(),
            "zone" => self.zone.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSection {
    /// Extra catalog files, loaded after `<config_dir>/schemas/*.toml`
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplySection {
    pub jobs: usize,
}

impl Default for ApplySection {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

impl AppConfig {
    /// Load from an explicit path, or from the default location if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = paths::config_file()?;
                if !default.exists() {
                    log::debug!("No config file at {}, using defaults", default.display());
                    return Ok(Self::default());
                }
                default
            }
        };
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn workspace_dir(&self) -> Result<PathBuf> {
        match &self.engine.workspace_dir {
            Some(dir) => Ok(paths::expand(dir)),
            None => paths::workspaces_dir(),
        }
    }

    pub fn catalog_paths(&self) -> Vec<PathBuf> {
        self.catalog.paths.iter().map(|p| paths::expand(p)).collect()
    }

    /// Settings for the Terraform engine
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::new(self.workspace_dir()?);
        config.binary = paths::expand(&self.engine.binary);
        config.provider_source.clone_from(&self.engine.provider_source);
        config.timeout = Duration::from_secs(self.engine.timeout_secs);
        config.lookup_timeout = Duration::from_secs(self.engine.lookup_timeout_secs);
        config.init_retry = RetryConfig {
            max_attempts: self.engine.init_retries.max(1),
            ..RetryConfig::default()
        };
        Ok(config)
    }

    /// Provider defaults from the config file, then the environment.
    pub fn provider_defaults(&self) -> ProviderConfig {
        self.provider_defaults_with(|var| std::env::var(var).ok())
    }

    fn provider_defaults_with(&self, env: impl Fn(&str) -> Option<String>) -> ProviderConfig {
        let mut provider = ProviderConfig::new();
        for &(key, var) in CREDENTIAL_ENV {
            let value = self
                .credentials
                .get(key)
                .map(str::to_string)
                .or_else(|| env(var).filter(|v| !v.is_empty()));
            if let Some(value) = value {
                provider.insert(key, value);
            }
        }
        if provider.get("region").is_none() {
            provider.insert("region", DEFAULT_REGION);
        }
        provider
    }
}

/// Fail unless every request can reach an API key
pub fn require_api_key<'a>(
    defaults: &ProviderConfig,
    requests: impl IntoIterator<Item = &'a ParameterSet>,
) -> Result<()> {
    if defaults.get("ibmcloud_api_key").is_some() {
        return Ok(());
    }
    let missing = requests
        .into_iter()
        .filter(|params| !params.get("ibmcloud_api_key").is_some_and(|v| !v.is_null()))
        .count();
    if missing > 0 {
        bail!(
            "No IBM Cloud API key: set ibmcloud_api_key in [credentials], export IC_API_KEY, \
             or pass it as a parameter ({missing} request(s) affected)"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::default();
        assert_eq!(config.engine.binary, "terraform");
        assert_eq!(config.engine.timeout_secs, 1800);
        assert_eq!(config.engine.lookup_timeout_secs, 300);
        assert_eq!(config.engine.provider_source, "IBM-Cloud/ibm");
        assert_eq!(config.apply.jobs, 4);
    }

    #[test]
    fn test_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[engine]
timeout_secs = 60
workspace_dir = "/var/lib/cloudstate"

[credentials]
region = "eu-de"

[catalog]
paths = ["/etc/cloudstate/extra.toml"]
"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.engine.timeout_secs, 60);
        assert_eq!(config.engine.lookup_timeout_secs, 300);
        assert_eq!(config.workspace_dir().unwrap(), PathBuf::from("/var/lib/cloudstate"));
        assert_eq!(config.catalog_paths(), vec![PathBuf::from("/etc/cloudstate/extra.toml")]);

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.timeout, Duration::from_secs(60));
        assert_eq!(engine.init_retry.max_attempts, 3);
    }

    #[test]
    fn test_unknown_key_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[engine]\ntimeout = 5\n").unwrap();
        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid TOML"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/config.toml"))).unwrap_err();
        assert!(err.to_string().contains("Could not read config file"));
    }

    #[test]
    fn test_config_beats_env_beats_default() {
        let config = AppConfig {
            credentials: Credentials {
                ibmcloud_api_key: Some("from-config".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let provider = config.provider_defaults_with(env_of(&[
            ("IC_API_KEY", "from-env"),
            ("IC_ZONE", "dal10"),
        ]));
        assert_eq!(provider.get("ibmcloud_api_key"), Some("from-config"));
        assert_eq!(provider.get("zone"), Some("dal10"));
        assert_eq!(provider.get("region"), Some(DEFAULT_REGION));
    }

    #[test]
    fn test_env_region_and_empty_values() {
        let provider = AppConfig::default()
            .provider_defaults_with(env_of(&[("IC_REGION", "eu-gb"), ("IC_API_KEY", "")]));
        assert_eq!(provider.get("region"), Some("eu-gb"));
        assert_eq!(provider.get("ibmcloud_api_key"), None);
    }

    #[test]
    fn test_require_api_key() {
        let empty = ProviderConfig::new();
        let with_key = json!({ "ibmcloud_api_key": "k", "name": "a" });
        let without_key = json!({ "name": "b" });
        let with_key = with_key.as_object().unwrap();
        let without_key = without_key.as_object().unwrap();

        assert!(require_api_key(&empty, [with_key]).is_ok());
        assert!(require_api_key(&empty, [with_key, without_key]).is_err());

        let mut defaults = ProviderConfig::new();
        defaults.insert("ibmcloud_api_key", "k");
        assert!(require_api_key(&defaults, [without_key]).is_ok());
    }
}
