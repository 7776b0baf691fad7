mod catalog;
mod cli;
mod commands;
mod config;
mod engine;
mod manifest;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

/// Exit code when a request failed
const EXIT_FAILED: u8 = 1;
/// Exit code for usage and configuration errors
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    match run(&ctx, cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run a command; `Ok(false)` means some request failed
fn run(ctx: &Context, command: Command) -> Result<bool> {
    match command {
        Command::Apply(args) => commands::apply::apply(ctx, args),
        Command::Diff(args) => commands::apply::diff(ctx, args),
        Command::Validate { manifest } => commands::apply::validate_manifest(ctx, &manifest),
        Command::Reconcile(args) => commands::resource::reconcile(ctx, args),
        Command::Info(args) => commands::resource::info(ctx, args),
        Command::Schemas(cmd) => commands::schemas::run(ctx, cmd),
        Command::Doctor => commands::doctor::run(ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cloudstate", &mut io::stdout());
            Ok(true)
        }
    }
}
