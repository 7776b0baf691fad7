use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{ParamType, ResourceSchema};
use std::collections::BTreeMap;

use super::Session;
use crate::Context;
use crate::cli::SchemasCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: SchemasCommand) -> Result<bool> {
    let session = Session::load(ctx)?;
    match cmd {
        SchemasCommand::List => {
            list(&session);
            Ok(true)
        }
        SchemasCommand::Show { name, json } => {
            let Some(schema) = session.catalog.table.get(&name) else {
                bail!("Unknown resource type '{name}' (see `cloudstate schemas list`)");
            };
            if json {
                ui::json(schema)?;
            } else {
                show(schema);
            }
            Ok(true)
        }
    }
}

fn list(session: &Session) {
    ui::header("Resource Schemas");
    for schema in session.catalog.table.iter() {
        let kind = if schema.data_only { "lookup".cyan() } else { "resource".green() };
        println!(
            "  {:<30} {:<9} {} {}",
            schema.name,
            kind,
            format!("v{}", schema.provider_version).dimmed(),
            schema.description.dimmed()
        );
    }
    println!();
    ui::dim(&format!("Sources: {}", session.catalog.sources.join(", ")));
}

fn show(schema: &ResourceSchema) {
    ui::header(&schema.name);
    if !schema.description.is_empty() {
        ui::dim(&schema.description);
    }
    ui::kv("engine type", &schema.engine_type);
    ui::kv("provider version", &schema.provider_version);
    ui::kv("identity", &schema.identity_keys.join(", "));
    if schema.data_only {
        ui::kv("mode", "lookup only");
    }

    if !schema.data_only {
        ui::section("Required");
        print_keys(schema.required_keys.iter().map(|(k, t)| (k.as_str(), *t)));

        ui::section("Parameters");
        let optional = schema
            .field_types
            .iter()
            .filter(|(k, _)| !schema.required_keys.iter().any(|(r, _)| r == *k))
            .map(|(k, t)| (k.as_str(), *t));
        print_keys(optional);
    }

    if !schema.conflicts.is_empty() {
        ui::section("Conflicts");
        for line in conflict_lines(&schema.conflicts) {
            println!("  {line}");
        }
    }

    if !schema.defaults.is_empty() {
        ui::section("Defaults");
        for (key, value) in &schema.defaults {
            ui::kv(key, &value.to_string());
        }
    }

    match &schema.lookup {
        Some(lookup) => {
            ui::section("Lookup");
            print_keys(lookup.required_keys.iter().map(|(k, t)| (k.as_str(), *t)));
            let optional = lookup
                .field_types
                .iter()
                .filter(|(k, _)| !lookup.required_keys.iter().any(|(r, _)| r == *k))
                .map(|(k, t)| (k.as_str(), *t));
            for (key, ty) in optional {
                println!("  {:<32} {} {}", key, ty.to_string().dimmed(), "(optional)".dimmed());
            }
        }
        None => {
            println!();
            ui::dim("No lookup: existing resources are only addressed by --id");
        }
    }
}

fn print_keys<'a>(keys: impl Iterator<Item = (&'a str, ParamType)>) {
    let mut any = false;
    for (key, ty) in keys {
        println!("  {:<32} {}", key, ty.to_string().dimmed());
        any = true;
    }
    if !any {
        ui::dim("(none)");
    }
}

/// One line per conflicting pair, each pair once
fn conflict_lines(conflicts: &BTreeMap<String, std::collections::BTreeSet<String>>) -> Vec<String> {
    let mut lines = Vec::new();
    for (key, partners) in conflicts {
        for partner in partners {
            let mirrored = key > partner && conflicts.get(partner).is_some_and(|p| p.contains(key));
            if !mirrored {
                lines.push(format!("{key} / {partner}"));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn test_conflict_lines_dedup_symmetric_pairs() {
        let table = catalog::builtin().unwrap();
        let bm = table.get("ibm_compute_bare_metal").unwrap();
        let lines = conflict_lines(&bm.conflicts);
        assert!(lines.contains(&"image_template_id / os_reference_code".to_string()));
        assert!(!lines.contains(&"os_reference_code / image_template_id".to_string()));
    }
}
