use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use reconcile::{Lifecycle, Target};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cloudstate")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative, idempotent IBM Cloud resources over Terraform", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to <config dir>/config.toml)
    #[arg(long, global = true, env = "CLOUDSTATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bring every resource in a manifest to its declared state
    Apply(ApplyArgs),

    /// Show what apply would do, without changing anything
    Diff(DiffArgs),

    /// Bring a single resource to the requested state
    Reconcile(ReconcileArgs),

    /// Look up a resource without changing anything
    Info(InfoArgs),

    /// Check a manifest against the schema catalog (no engine calls)
    Validate {
        /// Manifest file (TOML, or JSON with a .json extension)
        manifest: PathBuf,
    },

    /// Inspect the schema catalog
    #[command(subcommand)]
    Schemas(SchemasCommand),

    /// Check engine, credentials, config and catalog
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Manifest commands
// ============================================================================

#[derive(Args)]
pub struct ApplyArgs {
    /// Manifest file (TOML, or JSON with a .json extension)
    pub manifest: PathBuf,

    /// Show the plan without applying it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of resources reconciled in parallel (defaults to [apply] jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Only these resources: `type` or `type.name` (repeatable)
    #[arg(short, long)]
    pub target: Vec<Target>,

    /// Print results as JSON (changes then require --yes)
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Manifest file (TOML, or JSON with a .json extension)
    pub manifest: PathBuf,

    /// Only these resources: `type` or `type.name` (repeatable)
    #[arg(short, long)]
    pub target: Vec<Target>,

    /// Number of lookups run in parallel (defaults to [apply] jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Single-request commands
// ============================================================================

#[derive(Args)]
pub struct ReconcileArgs {
    /// Resource type, e.g. ibm_container_cluster
    pub resource_type: String,

    /// Parameter as key=value; values are read as JSON when they parse
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Desired state
    #[arg(short, long, default_value = "present")]
    pub state: Lifecycle,

    /// Address an existing resource by its identifier
    #[arg(long)]
    pub id: Option<String>,

    /// Show the decision without applying it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Resource type, e.g. ibm_container_cluster_info
    pub resource_type: String,

    /// Lookup parameter as key=value
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Schemas
// ============================================================================

#[derive(Subcommand)]
pub enum SchemasCommand {
    /// List every schema in the catalog
    List,

    /// Show the parameters of one schema
    Show {
        /// Schema name
        name: String,

        /// Print the schema as JSON
        #[arg(long)]
        json: bool,
    },
}
