//! Plan display

use colored::Colorize;
use reconcile::{BatchItem, Decision, Failure};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::ui;

/// Decided action for one manifest entry
#[derive(Debug, Clone, Serialize)]
pub struct PlannedChange {
    pub resource: String,
    pub resource_type: String,
    #[serde(flatten)]
    pub result: PlanResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PlanResult {
    Decided(Decision),
    Failed { error: Failure },
}

impl PlannedChange {
    pub fn new(item: &BatchItem<'_>, result: Result<Decision, Failure>) -> Self {
        Self {
            resource: item.label(),
            resource_type: item.schema.name.clone(),
            result: match result {
                Ok(decision) => PlanResult::Decided(decision),
                Err(error) => PlanResult::Failed { error },
            },
        }
    }

    pub fn decision(&self) -> Option<&Decision> {
        match &self.result {
            PlanResult::Decided(d) => Some(d),
            PlanResult::Failed { .. } => None,
        }
    }

    pub fn is_change(&self) -> bool {
        self.decision().is_some_and(Decision::is_change)
    }
}

/// Counts shown under the plan
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub create: usize,
    pub update: usize,
    pub destroy: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl PlanCounts {
    pub fn of(changes: &[PlannedChange]) -> Self {
        let mut counts = Self::default();
        for change in changes {
            match change.decision() {
                Some(Decision::Create) => counts.create += 1,
                Some(Decision::Update) => counts.update += 1,
                Some(Decision::Destroy) => counts.destroy += 1,
                Some(Decision::Skip { .. }) => counts.unchanged += 1,
                None => counts.failed += 1,
            }
        }
        counts
    }

    pub fn changes(&self) -> usize {
        self.create + self.update + self.destroy
    }
}

/// Display the plan grouped by resource type
pub fn display_plan(changes: &[PlannedChange], verbose: bool) {
    let counts = PlanCounts::of(changes);
    if counts.changes() == 0 && counts.failed == 0 {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    let mut by_type: BTreeMap<&str, Vec<&PlannedChange>> = BTreeMap::new();
    for change in changes {
        by_type.entry(change.resource_type.as_str()).or_default().push(change);
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Reconciliation Plan".bold()
    );
    println!("│");

    for (resource_type, type_changes) in &by_type {
        println!("│ {}", resource_type.bold());
        for change in type_changes {
            match &change.result {
                PlanResult::Decided(decision) => {
                    if !decision.is_change() && !verbose {
                        continue;
                    }
                    println!(
                        "│   {} {:<40} {}",
                        ui::decision_symbol(decision),
                        change.resource,
                        decision.to_string().dimmed()
                    );
                }
                PlanResult::Failed { error } => {
                    println!("│   {} {:<40} {}", "✗".red(), change.resource, error.kind);
                    println!("│       {}", error.message.dimmed());
                }
            }
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to destroy, {} unchanged",
        counts.create.to_string().green(),
        counts.update.to_string().yellow(),
        counts.destroy.to_string().red(),
        counts.unchanged
    );
    if counts.failed > 0 {
        println!("│       {} could not be planned", counts.failed.to_string().red());
    }
    println!("└─────────────────────────────────────────────────────┘");
}
