use anyhow::Result;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tfkit::TerraformEngine;

use crate::Context;
use crate::catalog;
use crate::config::AppConfig;
use crate::paths;
use crate::ui;

const TERRAFORM_INSTALL_URL: &str = "https://developer.hashicorp.com/terraform/install";

struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
    fix_cmd: Option<String>,
}

pub fn run(ctx: &Context) -> Result<bool> {
    ui::header("cloudstate Health Check");

    let mut issues: Vec<Issue> = Vec::new();

    let config = check_config(ctx, &mut issues);
    check_engine(&config, &mut issues);
    check_credentials(&config, &mut issues);
    check_catalog(&config, &mut issues);
    check_workspaces(&config, &mut issues);

    println!();
    if issues.is_empty() {
        ui::success("All checks passed!");
    } else {
        print_issue_summary(&issues);
    }

    Ok(issues.is_empty())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}  {} {}",
            format!("{}.", i + 1).bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
        println!();
    }
}

/// Load the config, falling back to defaults when it is broken
fn check_config(ctx: &Context, issues: &mut Vec<Issue>) -> AppConfig {
    ui::section("Configuration");

    let path = match &ctx.config {
        Some(path) => Some(path.clone()),
        None => paths::config_file().ok(),
    };
    let Some(path) = path else {
        issues.push(Issue {
            category: "Configuration",
            summary: "Could not determine config directory".into(),
            detail: None,
            fix: Some(format!("Ensure $HOME is set or set {}", paths::ENV_CONFIG_DIR)),
            fix_cmd: None,
        });
        return AppConfig::default();
    };

    if !path.exists() && ctx.config.is_none() {
        println!("  {} {} {}", "○".dimmed(), path.display(), "(not present, using defaults)".dimmed());
        return AppConfig::default();
    }

    match AppConfig::from_file(&path) {
        Ok(config) => {
            println!("  {} {}", "✓".green(), path.display());
            config
        }
        Err(e) => {
            println!("  {} {} {}", "✗".red(), path.display(), "(invalid)".red());
            issues.push(Issue {
                category: "Configuration",
                summary: format!("{} could not be loaded", path.display()),
                detail: Some(format!("{e:#}")),
                fix: Some("Fix the file or move it aside to use defaults".into()),
                fix_cmd: Some(format!("$EDITOR {}", path.display())),
            });
            AppConfig::default()
        }
    }
}

fn check_engine(config: &AppConfig, issues: &mut Vec<Issue>) {
    ui::section("Provisioning Engine");

    let engine = config
        .engine_config()
        .map_err(|e| format!("{e:#}"))
        .and_then(|c| TerraformEngine::new(c).map_err(|e| e.to_string()));
    let engine = match engine {
        Ok(engine) => engine,
        Err(reason) => {
            println!("  {} {} {}", "✗".red(), config.engine.binary, "(missing)".red());
            issues.push(missing_engine(&config.engine.binary, reason));
            return;
        }
    };

    match engine.version() {
        Ok(version) => println!(
            "  {} {} {}",
            "✓".green(),
            engine.binary().display(),
            format!("v{version}").dimmed()
        ),
        Err(e) => {
            println!("  {} {} {}", "⚠".yellow(), engine.binary().display(), "(version unknown)".yellow());
            issues.push(Issue {
                category: "Provisioning Engine",
                summary: "Could not read the Terraform version".into(),
                detail: Some(e.to_string()),
                fix: None,
                fix_cmd: Some(format!("{} version", engine.binary().display())),
            });
        }
    }
    ui::kv("provider source", &config.engine.provider_source);
}

fn missing_engine(binary: &str, reason: String) -> Issue {
    Issue {
        category: "Provisioning Engine",
        summary: format!("{binary} is not available"),
        detail: Some(reason),
        fix: Some(format!(
            "Install Terraform ({TERRAFORM_INSTALL_URL}) or set [engine] binary in config.toml"
        )),
        fix_cmd: None,
    }
}

fn check_credentials(config: &AppConfig, issues: &mut Vec<Issue>) {
    ui::section("Credentials");

    let provider = config.provider_defaults();
    if provider.get("ibmcloud_api_key").is_some() {
        println!("  {} ibmcloud_api_key {}", "✓".green(), "(set)".dimmed());
    } else {
        println!("  {} ibmcloud_api_key {}", "✗".red(), "(missing)".red());
        issues.push(Issue {
            category: "Credentials",
            summary: "No IBM Cloud API key configured".into(),
            detail: Some("Requests must then pass ibmcloud_api_key as a parameter".into()),
            fix: Some("Set ibmcloud_api_key in [credentials] or export IC_API_KEY".into()),
            fix_cmd: Some("export IC_API_KEY=<key>".into()),
        });
    }
    for key in ["region", "zone"] {
        if let Some(value) = provider.get(key) {
            ui::kv(key, value);
        }
    }
}

fn check_catalog(config: &AppConfig, issues: &mut Vec<Issue>) {
    ui::section("Schema Catalog");

    let user_dir = paths::schemas_dir().ok();
    match catalog::load(user_dir.as_deref(), &config.catalog_paths()) {
        Ok(catalog) => {
            println!(
                "  {} {} schemas {}",
                "✓".green(),
                catalog.table.len(),
                format!("from {}", catalog.sources.join(", ")).dimmed()
            );
        }
        Err(e) => {
            println!("  {} {}", "✗".red(), "catalog could not be loaded".red());
            issues.push(Issue {
                category: "Schema Catalog",
                summary: "A schema catalog is invalid".into(),
                detail: Some(format!("{e:#}")),
                fix: Some("Fix or remove the catalog file named above".into()),
                fix_cmd: None,
            });
        }
    }
}

fn check_workspaces(config: &AppConfig, issues: &mut Vec<Issue>) {
    ui::section("Workspaces");

    let dir: Option<PathBuf> = config.workspace_dir().ok();
    let Some(dir) = dir else {
        issues.push(Issue {
            category: "Workspaces",
            summary: "Could not determine the workspace directory".into(),
            detail: None,
            fix: Some(format!("Set {} or [engine] workspace_dir", paths::ENV_STATE_DIR)),
            fix_cmd: None,
        });
        return;
    };

    match fs::create_dir_all(&dir) {
        Ok(()) => println!("  {} {}", "✓".green(), dir.display()),
        Err(e) => {
            println!("  {} {} {}", "✗".red(), dir.display(), "(not writable)".red());
            issues.push(Issue {
                category: "Workspaces",
                summary: format!("{} is not writable", dir.display()),
                detail: Some(e.to_string()),
                fix: Some("Choose another [engine] workspace_dir".into()),
                fix_cmd: None,
            });
        }
    }
}
