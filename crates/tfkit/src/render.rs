//! Rendering of engine requests into Terraform JSON configuration.

use reconcile::{EngineRequest, Mode};
use serde_json::{Value, json};

/// Provider name used in `required_providers` and provider blocks
pub const PROVIDER_NAME: &str = "ibm";

/// Local name of the single block in every workspace
const BLOCK_NAME: &str = "this";

/// Terraform address of the block a request renders to.
pub fn address(request: &EngineRequest) -> String {
    match request.mode {
        Mode::Lookup => format!("data.{}.{BLOCK_NAME}", request.resource_type),
        Mode::Resource => format!("{}.{BLOCK_NAME}", request.resource_type),
    }
}

/// Render the `main.tf.json` document for a request.
///
/// Credentials are never written to disk; they reach the provider through
/// the environment. Region and zone are written so that a workspace is
/// pinned to the location it was created in.
pub fn render_config(request: &EngineRequest, provider_source: &str) -> Value {
    let mut provider = serde_json::Map::new();
    for key in ["region", "zone"] {
        if let Some(value) = request.provider.get(key) {
            provider.insert(key.to_string(), Value::String(value.to_string()));
        }
    }

    let block_kind = match request.mode {
        Mode::Lookup => "data",
        Mode::Resource => "resource",
    };

    json!({
        "terraform": {
            "required_providers": {
                PROVIDER_NAME: {
                    "source": provider_source,
                    "version": request.provider_version,
                }
            }
        },
        "provider": {
            PROVIDER_NAME: provider,
        },
        block_kind: {
            request.resource_type.as_str(): {
                BLOCK_NAME: request.params,
            }
        },
        "output": {
            "attributes": {
                "value": format!("${{{}}}", address(request)),
                "sensitive": true,
            }
        }
    })
}

/// Provider version pinned in a rendered document, if any.
pub fn pinned_version(config: &Value) -> Option<&str> {
    config
        .pointer(&format!("/terraform/required_providers/{PROVIDER_NAME}/version"))
        .and_then(Value::as_str)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use reconcile::{Action, CancelFlag, Identity, ProviderConfig};

    pub(crate) fn request(mode: Mode, action: Option<Action>) -> EngineRequest {
        let mut provider = ProviderConfig::new();
        provider.insert("ibmcloud_api_key", "secret-key");
        provider.insert("region", "us-south");
        let params = json!({ "name": "c1", "datacenter": "dal10" });
        EngineRequest {
            resource_type: "ibm_container_cluster".to_string(),
            mode,
            action,
            params: params.as_object().cloned().unwrap_or_default(),
            provider_version: "1.23.0".to_string(),
            identity: Identity::default(),
            scope_key: "0123456789abcdef".to_string(),
            provider,
            cancel: CancelFlag::new(),
        }
    }

    #[test]
    fn test_address() {
        assert_eq!(address(&request(Mode::Lookup, None)), "data.ibm_container_cluster.this");
        assert_eq!(
            address(&request(Mode::Resource, Some(Action::Create))),
            "ibm_container_cluster.this"
        );
    }

    #[test]
    fn test_render_resource() {
        let config = render_config(&request(Mode::Resource, Some(Action::Create)), "IBM-Cloud/ibm");
        assert_eq!(config["terraform"]["required_providers"]["ibm"]["source"], "IBM-Cloud/ibm");
        assert_eq!(pinned_version(&config), Some("1.23.0"));
        assert_eq!(config["provider"]["ibm"], json!({ "region": "us-south" }));
        assert_eq!(config["resource"]["ibm_container_cluster"]["this"]["name"], "c1");
        assert_eq!(config["output"]["attributes"]["value"], "${ibm_container_cluster.this}");
        assert!(config.get("data").is_none());
    }

    #[test]
    fn test_render_lookup() {
        let config = render_config(&request(Mode::Lookup, None), "IBM-Cloud/ibm");
        assert_eq!(config["data"]["ibm_container_cluster"]["this"]["datacenter"], "dal10");
        assert_eq!(config["output"]["attributes"]["value"], "${data.ibm_container_cluster.this}");
        assert!(config.get("resource").is_none());
    }

    #[test]
    fn test_credentials_not_rendered() {
        let config = render_config(&request(Mode::Resource, Some(Action::Update)), "IBM-Cloud/ibm");
        assert!(!config.to_string().contains("secret-key"));
    }
}
