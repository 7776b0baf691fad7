pub mod apply;
pub mod doctor;
pub mod resource;
pub mod schemas;

use anyhow::{Context as AnyhowContext, Result};
use reconcile::ProviderConfig;
use tfkit::TerraformEngine;

use crate::Context;
use crate::catalog::{self, Catalog};
use crate::config::AppConfig;
use crate::paths;

/// Configuration and catalog shared by every command
pub struct Session {
    pub config: AppConfig,
    pub catalog: Catalog,
}

impl Session {
    pub fn load(ctx: &Context) -> Result<Self> {
        let config = AppConfig::load(ctx.config.as_deref())?;
        let user_dir = paths::schemas_dir()?;
        let catalog = catalog::load(Some(&user_dir), &config.catalog_paths())?;
        Ok(Self { config, catalog })
    }

    /// Terraform engine from the `[engine]` section
    pub fn engine(&self) -> Result<TerraformEngine> {
        let engine_config = self.config.engine_config()?;
        TerraformEngine::new(engine_config).context("Cannot start the provisioning engine")
    }

    pub fn provider_defaults(&self) -> ProviderConfig {
        self.config.provider_defaults()
    }

    pub fn jobs(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.config.apply.jobs).max(1)
    }
}
