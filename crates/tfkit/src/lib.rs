//! # tfkit
//!
//! Terraform CLI provisioning engine for the `reconcile` protocol.
//!
//! This crate provides:
//! - Rendering of engine requests into `main.tf.json` workspaces
//! - One isolated working directory (and state file) per resource scope
//! - Import of resources addressed by id before they are updated or destroyed
//! - Deadlines, cancellation and retry of transient `terraform init` failures
//!
//! ## Example
//!
//! ```no_run
//! use reconcile::Reconciler;
//! use tfkit::{EngineConfig, TerraformEngine};
//!
//! let engine = TerraformEngine::new(EngineConfig::new("/tmp/cloudstate")).expect("terraform not found");
//! let reconciler = Reconciler::new(&engine);
//! # let _ = reconciler;
//! ```
//!
//! ## Step sequence
//!
//! Every request runs `init` first. Lookups then `apply` the data source and
//! read `output -json attributes`. Creates and updates do the same against a
//! resource block, importing the resource first when it is addressed by id
//! and missing from local state. Destroys import the same way and run
//! `destroy`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod render;
pub mod retry;
pub mod types;
pub mod workspace;

pub use error::{Error, ErrorCategory, Result};
pub use types::{DEFAULT_PROVIDER_SOURCE, EngineConfig, RetryConfig};
pub use workspace::Workspace;

use backend::{CommandRunner, Invocation};
use reconcile::{
    Action, Engine, EngineError, EngineInvocationResult, EngineRequest, LookupFailure, Mode,
    ProviderConfig,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Provider config keys and the environment variables the provider reads them from
const CREDENTIAL_ENV: &[(&str, &str)] = &[
    ("ibmcloud_api_key", "IC_API_KEY"),
    ("iaas_classic_username", "IAAS_CLASSIC_USERNAME"),
    ("iaas_classic_api_key", "IAAS_CLASSIC_API_KEY"),
    ("region", "IC_REGION"),
    ("zone", "IC_ZONE"),
];

/// Deadline for `terraform version`
const VERSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment for a terraform child process.
///
/// Credentials travel only through the environment, never through files.
pub fn credential_env(provider: &ProviderConfig) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = CREDENTIAL_ENV
        .iter()
        .filter_map(|(key, var)| provider.get(key).map(|v| ((*var).to_string(), v.to_string())))
        .collect();
    for (var, value) in [("TF_IN_AUTOMATION", "1"), ("TF_INPUT", "0"), ("CHECKPOINT_DISABLE", "1")] {
        env.push((var.to_string(), value.to_string()));
    }
    env
}

/// Provisioning engine that drives the `terraform` CLI.
pub struct TerraformEngine {
    config: EngineConfig,
    binary: PathBuf,
    runner: Box<dyn CommandRunner>,
}

impl TerraformEngine {
    /// Create an engine with the default runner.
    ///
    /// Returns an error if the terraform binary cannot be found.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let binary = which::which(&config.binary)
            .map_err(|e| Error::TerraformNotFound(format!("{}: {e}", config.binary.display())))?;
        log::debug!("Using terraform at {}", binary.display());
        Ok(Self {
            config,
            binary,
            runner: Box::new(backend::default_runner()),
        })
    }

    /// Create an engine with a custom runner (useful for testing).
    pub fn with_runner(config: EngineConfig, runner: Box<dyn CommandRunner>) -> Self {
        let binary = config.binary.clone();
        Self {
            config,
            binary,
            runner,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Path of the terraform binary in use.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Installed terraform version, e.g. `1.9.5`.
    pub fn version(&self) -> Result<String> {
        let env = credential_env(&ProviderConfig::new());
        let cancel = reconcile::CancelFlag::new();
        let invocation = Invocation {
            program: &self.binary,
            args: vec!["version".to_string(), "-json".to_string()],
            cwd: Path::new("."),
            env: &env,
            timeout: VERSION_TIMEOUT,
            cancel: &cancel,
        };
        let output = self.runner.run(&invocation)?;
        if !output.is_success() {
            return Err(Error::from_terraform_output("version", output));
        }
        let parsed: serde_json::Value = serde_json::from_str(&output.stdout)?;
        Ok(parsed
            .get("terraform_version")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }

    /// Total time allowed for a request.
    pub fn timeout_for(&self, mode: Mode) -> Duration {
        match mode {
            Mode::Lookup => self.config.lookup_timeout,
            Mode::Resource => self.config.timeout,
        }
    }

    fn run(&self, request: &EngineRequest) -> Result<EngineInvocationResult> {
        if request.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let session = Session {
            engine: self,
            request,
            workspace: Workspace::prepare(
                &self.config.workspace_dir,
                request,
                &self.config.provider_source,
            )?,
            env: credential_env(&request.provider),
            started: Instant::now(),
            budget: self.timeout_for(request.mode),
        };

        retry::with_retry(&self.config.init_retry, Some(&retry::LogCallback), || {
            session.step("init", &["-input=false", "-no-color"])
        })?;

        match (request.mode, request.action) {
            (Mode::Resource, Some(Action::Destroy)) => {
                session.import_if_needed()?;
                session.step("destroy", &["-auto-approve", "-input=false", "-no-color"])?;
                Ok(match &request.identity.id {
                    Some(id) => EngineInvocationResult::success(serde_json::json!({ "id": id }).to_string()),
                    None => EngineInvocationResult::success(""),
                })
            }
            (Mode::Resource, _) => {
                session.import_if_needed()?;
                session.apply_and_read()
            }
            (Mode::Lookup, _) => session.apply_and_read(),
        }
    }
}

impl Engine for TerraformEngine {
    fn invoke(&self, request: &EngineRequest) -> std::result::Result<EngineInvocationResult, EngineError> {
        log::debug!(
            "terraform {} {} ({}) in scope {}",
            request.mode,
            request.action.map_or("read", |a| a.as_str()),
            request.resource_type,
            request.scope_key
        );
        match self.run(request) {
            Ok(result) => Ok(result),
            // Only the data source read can report that nothing matched.
            Err(e @ Error::Command { .. }) if request.mode == Mode::Lookup && e.step() != Some("apply") => {
                Err(EngineError::Workspace(e.to_string()))
            }
            Err(Error::Command { output, .. }) => Ok(output),
            Err(Error::Timeout(_)) => Err(EngineError::Timeout(self.timeout_for(request.mode))),
            Err(Error::Cancelled) => Err(EngineError::Cancelled),
            Err(e @ (Error::TerraformNotFound(_) | Error::Spawn(_))) => Err(EngineError::Spawn(e.to_string())),
            Err(e @ (Error::Io(_) | Error::Json(_))) => Err(EngineError::Workspace(e.to_string())),
        }
    }

    fn classify_lookup_failure(&self, result: &EngineInvocationResult) -> LookupFailure {
        match ErrorCategory::from_stderr(&result.stderr) {
            ErrorCategory::NotFound => LookupFailure::NoMatch,
            _ => LookupFailure::Fatal,
        }
    }
}

/// One request's run through its workspace under a shared deadline.
struct Session<'a> {
    engine: &'a TerraformEngine,
    request: &'a EngineRequest,
    workspace: Workspace,
    env: Vec<(String, String)>,
    started: Instant,
    budget: Duration,
}

impl Session<'_> {
    fn step(&self, name: &str, args: &[&str]) -> Result<EngineInvocationResult> {
        if self.request.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let remaining = self.budget.saturating_sub(self.started.elapsed());
        if remaining.is_zero() {
            return Err(Error::Timeout(self.budget));
        }

        let mut argv = vec![name.to_string()];
        argv.extend(args.iter().map(|a| (*a).to_string()));
        log::debug!("terraform {} in {}", argv.join(" "), self.workspace.dir().display());

        let invocation = Invocation {
            program: &self.engine.binary,
            args: argv,
            cwd: self.workspace.dir(),
            env: &self.env,
            timeout: remaining,
            cancel: &self.request.cancel,
        };
        let output = self.engine.runner.run(&invocation)?;
        log::trace!("terraform {name} stdout:\n{}", output.stdout);
        log::trace!("terraform {name} stderr:\n{}", output.stderr);
        if output.is_success() {
            Ok(output)
        } else {
            log::debug!("terraform {name} exited with {}", output.exit_code);
            Err(Error::from_terraform_output(name, output))
        }
    }

    fn apply_and_read(&self) -> Result<EngineInvocationResult> {
        self.step("apply", &["-auto-approve", "-input=false", "-no-color"])?;
        self.step("output", &["-json", "attributes"])
    }

    /// Bring a resource addressed by id under this workspace's state.
    fn import_if_needed(&self) -> Result<()> {
        let Some(id) = self.request.identity.id.as_deref() else {
            return Ok(());
        };
        let address = render::address(self.request);

        if self.workspace.has_state() {
            let listed = self.step("state", &["list"])?;
            if listed.stdout.lines().any(|line| line.trim() == address) {
                log::debug!("{address} already in state");
                return Ok(());
            }
        }

        log::info!("Importing {address} ({id})");
        self.step("import", &["-input=false", "-no-color", address.as_str(), id])?;
        Ok(())
    }
}
