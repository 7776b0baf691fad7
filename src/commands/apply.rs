//! Manifest commands: apply, diff, validate

use anyhow::Result;
use colored::Colorize;
use reconcile::{BatchItem, Failure, Reconciler, filter_by_targets, validate_request};
use std::path::Path;

use super::Session;
use crate::Context;
use crate::cli::{ApplyArgs, DiffArgs};
use crate::config;
use crate::engine::{self, ApplyOptions};
use crate::manifest::Manifest;
use crate::ui;

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<bool> {
    let session = Session::load(ctx)?;
    let manifest = Manifest::load(&args.manifest)?;
    let items = filter_by_targets(manifest.items(&session.catalog.table)?, &args.target);
    if items.is_empty() {
        if !args.json {
            ui::warn("No resources selected");
        }
        return Ok(true);
    }

    let defaults = session.provider_defaults();
    config::require_api_key(&defaults, items.iter().map(|item| &item.params))?;
    let tf = session.engine()?;
    let reconciler = Reconciler::new(&tf).with_provider_defaults(defaults);

    if !args.json && !ctx.quiet {
        ui::header(&format!("Reconciling {}", args.manifest.display()));
    }

    let opts = ApplyOptions {
        dry_run: args.dry_run,
        jobs: session.jobs(args.jobs),
        yes: args.yes,
        verbose: ctx.verbose > 0,
        json: args.json,
        quiet: ctx.quiet,
    };
    let report = engine::apply(&reconciler, &items, &opts)?;

    if args.json {
        ui::json(&report)?;
    }
    Ok(report.summary.is_success())
}

pub fn diff(ctx: &Context, args: DiffArgs) -> Result<bool> {
    let session = Session::load(ctx)?;
    let manifest = Manifest::load(&args.manifest)?;
    let items = filter_by_targets(manifest.items(&session.catalog.table)?, &args.target);

    let defaults = session.provider_defaults();
    config::require_api_key(&defaults, items.iter().map(|item| &item.params))?;
    let tf = session.engine()?;
    let reconciler = Reconciler::new(&tf).with_provider_defaults(defaults);

    let planned = engine::plan(&reconciler, &items, session.jobs(args.jobs))?;
    let ok = planned.iter().all(|change| change.decision().is_some());

    if args.json {
        ui::json(&planned)?;
    } else {
        engine::differ::display_plan(&planned, ctx.verbose > 0);
    }
    Ok(ok)
}

struct ValidationEntry {
    resource: String,
    failure: Option<Failure>,
}

/// Validate a request the way `reconcile` would, without engine calls
fn check(item: &BatchItem<'_>) -> Option<Failure> {
    validate_request(item.schema, &item.params, &item.intent).err()
}

pub fn validate_manifest(ctx: &Context, manifest_path: &Path) -> Result<bool> {
    let session = Session::load(ctx)?;
    let manifest = Manifest::load(manifest_path)?;
    let items = manifest.items(&session.catalog.table)?;

    let entries: Vec<ValidationEntry> = items
        .iter()
        .map(|item| ValidationEntry {
            resource: item.label(),
            failure: check(item),
        })
        .collect();
    let invalid = entries.iter().filter(|e| e.failure.is_some()).count();

    if !ctx.quiet {
        ui::header(&format!("Validating {}", manifest_path.display()));
        for entry in &entries {
            match &entry.failure {
                None => println!("  {} {}", "✓".green(), entry.resource),
                Some(failure) => {
                    println!("  {} {} {}", "✗".red(), entry.resource, failure.kind.to_string().dimmed());
                    println!("      {}", failure.message);
                }
            }
        }
        println!();
    }

    if invalid == 0 {
        ui::success(&format!("{} resource(s) valid", entries.len()));
    } else {
        ui::error(&format!("{invalid} of {} resource(s) invalid", entries.len()));
    }
    Ok(invalid == 0)
}
