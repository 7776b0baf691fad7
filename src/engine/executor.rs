//! Apply flow - plan, confirm, reconcile the changes, summarize

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use reconcile::{BatchItem, Decision, ExecuteOptions, Outcome, ReconcileSummary, Reconciler};
use serde::Serialize;

use super::differ::{PlanResult, PlannedChange, display_plan};
use crate::progress::BarProgress;
use crate::ui;

/// Options for an apply run
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Plan only
    pub dry_run: bool,
    /// Number of scope groups reconciled in parallel
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Show unchanged entries in the plan
    pub verbose: bool,
    /// Machine-readable output; no plan display, so changes need `yes`
    pub json: bool,
    pub quiet: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            verbose: false,
            json: false,
            quiet: false,
        }
    }
}

/// Result for one manifest entry
#[derive(Debug, Clone, Serialize)]
pub struct ResourceResult {
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// `None` when the change was not applied (dry run or declined)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub resources: Vec<ResourceResult>,
    pub summary: ReconcileSummary,
    pub applied: bool,
}

/// Plan every item, then reconcile the ones that need a change
pub fn apply(reconciler: &Reconciler<'_>, items: &[BatchItem<'_>], opts: &ApplyOptions) -> Result<ApplyReport> {
    let planned = plan(reconciler, items, opts.jobs)?;

    if !opts.json {
        display_plan(&planned, opts.verbose);
    }

    let pending: Vec<usize> = (0..planned.len()).filter(|&i| planned[i].is_change()).collect();

    if opts.dry_run {
        if !opts.json {
            println!();
            ui::info("Dry run - no changes made");
        }
        return Ok(merge(planned, &pending, None));
    }

    if pending.is_empty() {
        return Ok(merge(planned, &pending, Some(Vec::new())));
    }

    if !opts.yes {
        if opts.json {
            bail!("{} change(s) pending: pass --yes to apply with --json", pending.len());
        }
        if !confirm_proceed()? {
            println!();
            println!("  {} Aborted", "✗".red());
            return Ok(merge(planned, &pending, None));
        }
    }

    let to_apply: Vec<BatchItem<'_>> = pending.iter().map(|&i| items[i].clone()).collect();
    let progress = BarProgress::new(to_apply.len(), "Applying", opts.quiet || opts.json);
    let report = reconcile::execute(
        reconciler,
        &to_apply,
        &ExecuteOptions { jobs: opts.jobs },
        &progress,
    )
    .context("Failed to run reconciliation batch")?;
    progress.finish();

    let merged = merge(planned, &pending, Some(report.outcomes));
    if !opts.json {
        print_summary(&merged.summary);
    }
    Ok(merged)
}

/// Decide every item without mutating anything
pub fn plan(reconciler: &Reconciler<'_>, items: &[BatchItem<'_>], jobs: usize) -> Result<Vec<PlannedChange>> {
    let decisions =
        reconcile::plan_all(reconciler, items, jobs).context("Failed to plan reconciliation batch")?;
    Ok(items
        .iter()
        .zip(decisions)
        .map(|(item, result)| PlannedChange::new(item, result))
        .collect())
}

/// Combine planned results with the outcomes of the applied subset.
///
/// `applied` holds one outcome per `pending` index, or `None` when nothing
/// was applied; pending entries are then counted as skipped.
fn merge(planned: Vec<PlannedChange>, pending: &[usize], applied: Option<Vec<Outcome>>) -> ApplyReport {
    let was_applied = applied.is_some();
    let mut applied = applied.map(Vec::into_iter);
    let mut summary = ReconcileSummary::default();
    let mut resources = Vec::with_capacity(planned.len());

    for (i, change) in planned.into_iter().enumerate() {
        let (decision, outcome) = match change.result {
            PlanResult::Decided(decision) if pending.contains(&i) => {
                let outcome = applied.as_mut().and_then(Iterator::next);
                (Some(decision), outcome)
            }
            PlanResult::Decided(decision) => {
                let outcome = match &decision {
                    Decision::Skip { found: true, attributes } => Outcome::unchanged(attributes.clone()),
                    _ => Outcome::already_absent(),
                };
                (Some(decision), Some(outcome))
            }
            PlanResult::Failed { error } => (None, Some(Outcome::Failure(error))),
        };

        match &outcome {
            Some(outcome) => summary.add_outcome(outcome),
            None => summary.skipped += 1,
        }
        resources.push(ResourceResult {
            resource: change.resource,
            decision,
            outcome,
        });
    }

    ApplyReport {
        resources,
        summary,
        applied: was_applied,
    }
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
pub fn print_summary(summary: &ReconcileSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Reconciliation complete!", "✓".green().bold());
    } else {
        println!("  {} Reconciliation finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.destroyed > 0 {
        println!("    • {} resources destroyed", summary.destroyed);
    }
    if summary.unchanged > 0 {
        println!("    • {} resources unchanged", summary.unchanged);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{
        Engine, EngineError, EngineInvocationResult, EngineRequest, FailureKind, Intent,
        LookupFailure, Mode, ParameterSet, SchemaTable,
    };
    use serde_json::json;
    use std::sync::Mutex;

    use crate::catalog;

    /// Engine where lookups find only the names it was seeded with
    struct FakeCloud {
        existing: Vec<String>,
        calls: Mutex<Vec<(Mode, Option<reconcile::Action>)>>,
    }

    impl FakeCloud {
        fn new(existing: &[&str]) -> Self {
            Self {
                existing: existing.iter().map(|s| (*s).to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn mutations(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(mode, _)| *mode == Mode::Resource)
                .count()
        }
    }

    impl Engine for FakeCloud {
        fn invoke(&self, request: &EngineRequest) -> Result<EngineInvocationResult, EngineError> {
            self.calls.lock().unwrap().push((request.mode, request.action));
            let name = request.params.get("name").and_then(|v| v.as_str()).unwrap_or("");
            match request.mode {
                Mode::Lookup if self.existing.iter().any(|e| e == name) => Ok(
                    EngineInvocationResult::success(json!({ "id": format!("id-{name}") }).to_string()),
                ),
                Mode::Lookup => Ok(EngineInvocationResult::failure(1, "Error: no matching cluster")),
                Mode::Resource => Ok(EngineInvocationResult::success(r#"{"id": "new"}"#)),
            }
        }

        fn classify_lookup_failure(&self, result: &EngineInvocationResult) -> LookupFailure {
            if result.stderr.contains("no matching") {
                LookupFailure::NoMatch
            } else {
                LookupFailure::Fatal
            }
        }
    }

    fn cluster<'a>(table: &'a SchemaTable, name: &str, intent: Intent) -> BatchItem<'a> {
        let params: ParameterSet = json!({
            "name": name,
            "datacenter": "dal10",
            "default_pool_size": 1,
            "hardware": "shared",
            "ibmcloud_api_key": "k",
        })
        .as_object()
        .cloned()
        .unwrap();
        BatchItem {
            schema: table.get("ibm_container_cluster").unwrap(),
            name: Some(name.to_string()),
            params,
            intent,
        }
    }

    fn quiet(dry_run: bool) -> ApplyOptions {
        ApplyOptions {
            dry_run,
            yes: true,
            json: true,
            quiet: true,
            jobs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_only_mutates_changes() {
        let table = catalog::builtin().unwrap();
        let cloud = FakeCloud::new(&["web"]);
        let reconciler = Reconciler::new(&cloud);
        let items = vec![
            cluster(&table, "web", Intent::present()),
            cluster(&table, "api", Intent::present()),
            cluster(&table, "old", Intent::absent()),
        ];

        let report = apply(&reconciler, &items, &quiet(false)).unwrap();
        assert!(report.applied);
        assert_eq!(report.summary.unchanged, 2);
        assert_eq!(report.summary.created, 1);
        assert_eq!(cloud.mutations(), 1);
        assert_eq!(report.resources[1].decision, Some(Decision::Create));
        assert!(report.resources[1].outcome.as_ref().is_some_and(Outcome::is_changed));
    }

    #[test]
    fn test_dry_run_never_mutates() {
        let table = catalog::builtin().unwrap();
        let cloud = FakeCloud::new(&[]);
        let reconciler = Reconciler::new(&cloud);
        let items = vec![cluster(&table, "api", Intent::present())];

        let report = apply(&reconciler, &items, &quiet(true)).unwrap();
        assert!(!report.applied);
        assert_eq!(report.summary.skipped, 1);
        assert!(report.resources[0].outcome.is_none());
        assert_eq!(cloud.mutations(), 0);
    }

    #[test]
    fn test_json_without_yes_refuses_changes() {
        let table = catalog::builtin().unwrap();
        let cloud = FakeCloud::new(&["web"]);
        let reconciler = Reconciler::new(&cloud);
        let opts = ApplyOptions {
            yes: false,
            ..quiet(false)
        };

        let items = vec![cluster(&table, "api", Intent::present())];
        let err = apply(&reconciler, &items, &opts).unwrap_err();
        assert!(err.to_string().contains("--yes"));
        assert_eq!(cloud.mutations(), 0);

        let items = vec![cluster(&table, "web", Intent::present())];
        let report = apply(&reconciler, &items, &opts).unwrap();
        assert_eq!(report.summary.unchanged, 1);
        assert_eq!(cloud.mutations(), 0);
    }

    #[test]
    fn test_plan_failures_are_reported() {
        let table = catalog::builtin().unwrap();
        let cloud = FakeCloud::new(&[]);
        let reconciler = Reconciler::new(&cloud);
        let mut item = cluster(&table, "api", Intent::present());
        item.params.remove("datacenter");

        let report = apply(&reconciler, &[item], &quiet(false)).unwrap();
        assert_eq!(report.summary.failed, 1);
        let kind = report.resources[0].outcome.as_ref().and_then(Outcome::failure_kind);
        assert_eq!(kind, Some(FailureKind::MissingRequiredParameters));
        assert!(kind.is_some_and(|k| k.is_validation()));
        assert!(cloud.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_merge_keeps_order() {
        let table = catalog::builtin().unwrap();
        let items = [cluster(&table, "a", Intent::present()), cluster(&table, "b", Intent::present())];
        let planned = vec![
            PlannedChange::new(&items[0], Ok(Decision::Skip { found: true, attributes: ParameterSet::new() })),
            PlannedChange::new(&items[1], Ok(Decision::Create)),
        ];
        let report = merge(planned, &[1], Some(vec![Outcome::failure(FailureKind::EngineTimeout, "slow")]));
        assert_eq!(report.resources[0].resource, "ibm_container_cluster.a");
        assert_eq!(report.summary.unchanged, 1);
        assert_eq!(report.summary.failed, 1);
    }
}
