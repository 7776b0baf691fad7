//! Single-request commands: reconcile, info

use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{Intent, Outcome, Reconciler, ResourceSchema};
use serde_json::Value;

use super::Session;
use crate::Context;
use crate::cli::{InfoArgs, ReconcileArgs};
use crate::config;
use crate::manifest;
use crate::progress;
use crate::ui;

fn find_schema<'s>(session: &'s Session, name: &str) -> Result<&'s ResourceSchema> {
    match session.catalog.table.get(name) {
        Some(schema) => Ok(schema),
        None => bail!("Unknown resource type '{name}' (see `cloudstate schemas list`)"),
    }
}

pub fn reconcile(ctx: &Context, args: ReconcileArgs) -> Result<bool> {
    let session = Session::load(ctx)?;
    let schema = find_schema(&session, &args.resource_type)?;
    let params = manifest::parse_params(&args.params, Some(schema))?;
    let intent = Intent {
        lifecycle: args.state,
        id: args.id,
    };

    let defaults = session.provider_defaults();
    config::require_api_key(&defaults, [&params])?;
    let tf = session.engine()?;
    let reconciler = Reconciler::new(&tf).with_provider_defaults(defaults);

    if args.dry_run {
        let decision = reconciler.plan(schema, &params, &intent);
        if args.json {
            match &decision {
                Ok(d) => ui::json(d)?,
                Err(f) => ui::json(f)?,
            }
        } else {
            match &decision {
                Ok(d) => println!("  {} {} {}", ui::decision_symbol(d), schema.name, d.to_string().dimmed()),
                Err(f) => ui::error(&f.to_string()),
            }
        }
        return Ok(decision.is_ok());
    }

    let spinner = (!args.json && !ctx.quiet)
        .then(|| progress::spinner(&format!("Reconciling {} ({})", schema.name, intent.lifecycle)));
    let outcome = reconciler.reconcile(schema, &params, &intent);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    report(ctx, &schema.name, &outcome, args.json)?;
    Ok(outcome.is_success())
}

pub fn info(ctx: &Context, args: InfoArgs) -> Result<bool> {
    let session = Session::load(ctx)?;
    let schema = find_schema(&session, &args.resource_type)?;
    let params = manifest::parse_params(&args.params, Some(schema))?;

    let defaults = session.provider_defaults();
    config::require_api_key(&defaults, [&params])?;
    let tf = session.engine()?;
    let reconciler = Reconciler::new(&tf).with_provider_defaults(defaults);

    let spinner = (!args.json && !ctx.quiet).then(|| progress::spinner(&format!("Looking up {}", schema.name)));
    let outcome = reconciler.lookup(schema, &params);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    report(ctx, &schema.name, &outcome, args.json)?;
    Ok(outcome.is_success())
}

fn report(ctx: &Context, name: &str, outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        return ui::json(outcome);
    }

    match outcome {
        Outcome::Success(s) => {
            let what = match (s.action, s.found) {
                (Some(action), _) => format!("{name}: {action} complete"),
                (None, true) => format!("{name}: already in the requested state"),
                (None, false) => format!("{name}: not found"),
            };
            ui::success(&what);
            if !s.attributes.is_empty() && !ctx.quiet {
                ui::section("Attributes");
                for (key, value) in &s.attributes {
                    ui::kv(key, &display_value(value));
                }
            }
        }
        Outcome::Failure(f) => {
            ui::error(&format!("{name}: {}", f.kind.to_string().bold()));
            ui::dim(&f.message);
            if ctx.verbose > 0
                && let Some(raw) = &f.raw
            {
                for line in raw.stderr.lines() {
                    ui::dim(line);
                }
            }
        }
    }
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
