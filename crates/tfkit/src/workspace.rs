//! Per-scope Terraform working directories.
//!
//! Every request runs in `<root>/<resource_type>/<mode>-<scope_key>`, so
//! requests for different resources never share state while repeated
//! requests for the same resource reuse it.

use crate::error::Result;
use crate::render;
use reconcile::EngineRequest;
use std::fs;
use std::path::{Path, PathBuf};

/// Rendered configuration file name
pub const CONFIG_FILE: &str = "main.tf.json";
/// Local state file name
pub const STATE_FILE: &str = "terraform.tfstate";
/// Provider lock file name
pub const LOCK_FILE: &str = ".terraform.lock.hcl";

/// A prepared working directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Directory a request runs in, without touching the filesystem.
    pub fn path_for(root: &Path, request: &EngineRequest) -> PathBuf {
        root.join(&request.resource_type)
            .join(format!("{}-{}", request.mode, request.scope_key))
    }

    /// Create the directory and write the request's configuration.
    ///
    /// When the pinned provider version changed since the last run the lock
    /// file is removed so `init` can select the new version.
    pub fn prepare(root: &Path, request: &EngineRequest, provider_source: &str) -> Result<Self> {
        let dir = Self::path_for(root, request);
        fs::create_dir_all(&dir)?;

        let config = render::render_config(request, provider_source);
        let config_path = dir.join(CONFIG_FILE);

        if let Ok(existing) = fs::read_to_string(&config_path) {
            let previous = serde_json::from_str::<serde_json::Value>(&existing).ok();
            let previous_version = previous.as_ref().and_then(render::pinned_version);
            if previous_version != render::pinned_version(&config) {
                let lock = dir.join(LOCK_FILE);
                if lock.exists() {
                    log::info!(
                        "Provider version changed ({} -> {}), removing {}",
                        previous_version.unwrap_or("none"),
                        request.provider_version,
                        lock.display()
                    );
                    fs::remove_file(&lock)?;
                }
            }
        }

        fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
        log::debug!("Prepared workspace {}", dir.display());
        Ok(Self { dir })
    }

    /// The working directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a previous run left local state behind.
    pub fn has_state(&self) -> bool {
        self.dir.join(STATE_FILE).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::request;
    use reconcile::{Action, Mode};
    use tempfile::TempDir;

    #[test]
    fn test_prepare_writes_config() {
        let temp = TempDir::new().unwrap();
        let req = request(Mode::Resource, Some(Action::Create));
        let ws = Workspace::prepare(temp.path(), &req, "IBM-Cloud/ibm").unwrap();

        assert_eq!(
            ws.dir(),
            temp.path().join("ibm_container_cluster").join("resource-0123456789abcdef")
        );
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(ws.dir().join(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(written["resource"]["ibm_container_cluster"]["this"]["name"], "c1");
        assert!(!ws.has_state());
    }

    #[test]
    fn test_lookup_and_resource_do_not_share_dirs() {
        let temp = TempDir::new().unwrap();
        let lookup = Workspace::path_for(temp.path(), &request(Mode::Lookup, None));
        let resource = Workspace::path_for(temp.path(), &request(Mode::Resource, Some(Action::Create)));
        assert_ne!(lookup, resource);
    }

    #[test]
    fn test_version_change_removes_lock() {
        let temp = TempDir::new().unwrap();
        let mut req = request(Mode::Resource, Some(Action::Create));
        let ws = Workspace::prepare(temp.path(), &req, "IBM-Cloud/ibm").unwrap();
        fs::write(ws.dir().join(LOCK_FILE), "lock").unwrap();

        Workspace::prepare(temp.path(), &req, "IBM-Cloud/ibm").unwrap();
        assert!(ws.dir().join(LOCK_FILE).exists());

        req.provider_version = "1.24.0".to_string();
        Workspace::prepare(temp.path(), &req, "IBM-Cloud/ibm").unwrap();
        assert!(!ws.dir().join(LOCK_FILE).exists());
    }

    #[test]
    fn test_has_state() {
        let temp = TempDir::new().unwrap();
        let req = request(Mode::Resource, Some(Action::Update));
        let ws = Workspace::prepare(temp.path(), &req, "IBM-Cloud/ibm").unwrap();
        fs::write(ws.dir().join(STATE_FILE), "{}").unwrap();
        assert!(ws.has_state());
    }
}
