//! Path resolution for cloudstate
//!
//! # Environment Variables
//!
//! - `CLOUDSTATE_CONFIG_DIR` - Override config directory
//! - `CLOUDSTATE_STATE_DIR` - Override state directory (Terraform workspaces live here)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `CLOUDSTATE_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/cloudstate` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\cloudstate`
//!    - macOS/Linux: `~/.config/cloudstate`
//!
//! For state_dir():
//! 1. `CLOUDSTATE_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/cloudstate` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\cloudstate`
//!    - macOS/Linux: `~/.local/state/cloudstate`

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_NAME: &str = "cloudstate";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "CLOUDSTATE_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "CLOUDSTATE_STATE_DIR";

/// Get the cloudstate config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_NAME);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join(APP_NAME));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_NAME);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the cloudstate state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_NAME);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return Ok(local_app_data.join(APP_NAME));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_NAME);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Default config file location
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Directory scanned for user schema catalogs
pub fn schemas_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("schemas"))
}

/// Default root for Terraform workspaces
pub fn workspaces_dir() -> Result<PathBuf> {
    Ok(state_dir()?.join("workspaces"))
}

/// Expand `~` and environment variables in a path string.
///
/// Unknown variables leave the input unchanged.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
