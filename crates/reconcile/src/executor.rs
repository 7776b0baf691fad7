//! Batch execution - many requests, serialized per state scope
//!
//! Requests that share a scope key would race on the same engine state, so
//! they run one after another in submission order. Distinct scopes run in
//! parallel on a rayon pool.

use crate::context::ProgressCallback;
use crate::planner::{Target, is_selected};
use crate::reconciler::{Decision, Reconciler, scope_key};
use crate::schema::ResourceSchema;
use crate::types::{
    ExecuteOptions, Failure, FailureKind, Intent, Outcome, ParameterSet, ReconcileSummary,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Errors setting up a batch
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("request {0} produced no result")]
    Incomplete(usize),
}

/// One request in a batch
#[derive(Debug, Clone)]
pub struct BatchItem<'s> {
    pub schema: &'s ResourceSchema,
    /// Caller-chosen name, unique per type
    pub name: Option<String>,
    pub params: ParameterSet,
    pub intent: Intent,
}

impl BatchItem<'_> {
    /// `type.name`, or just `type` for unnamed requests
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{}.{}", self.schema.name, name),
            None => self.schema.name.clone(),
        }
    }

    pub fn scope_key(&self) -> String {
        scope_key(self.schema, &self.params, self.intent.id.as_deref())
    }
}

/// Results of a batch, in submission order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<Outcome>,
    pub summary: ReconcileSummary,
}

/// Keep only the items selected by `targets`
pub fn filter_by_targets<'s>(items: Vec<BatchItem<'s>>, targets: &[Target]) -> Vec<BatchItem<'s>> {
    items
        .into_iter()
        .filter(|item| is_selected(targets, &item.schema.name, item.name.as_deref()))
        .collect()
}

/// Group item indices by scope key, groups and members in submission order
pub fn group_by_scope(items: &[BatchItem<'_>]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        let key = item.scope_key();
        match index.get(&key) {
            Some(&g) => groups[g].push(i),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![i]);
            }
        }
    }
    groups
}

/// Run `op` over every item: scope groups in parallel, each group sequentially.
///
/// Results come back in submission order.
pub fn run_grouped<T, F>(items: &[BatchItem<'_>], jobs: usize, op: F) -> Result<Vec<T>, BatchError>
where
    T: Send,
    F: Fn(&BatchItem<'_>) -> T + Sync,
{
    let groups = group_by_scope(items);
    let slots: Mutex<Vec<Option<T>>> = Mutex::new(items.iter().map(|_| None).collect());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()?;

    pool.install(|| {
        groups.par_iter().for_each(|group| {
            for &i in group {
                let result = op(&items[i]);
                slots.lock().unwrap_or_else(PoisonError::into_inner)[i] = Some(result);
            }
        });
    });

    slots
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or(BatchError::Incomplete(i)))
        .collect()
}

/// Reconcile every item and summarize the outcomes
pub fn execute<P: ProgressCallback>(
    reconciler: &Reconciler<'_>,
    items: &[BatchItem<'_>],
    opts: &ExecuteOptions,
    progress: &P,
) -> Result<BatchReport, BatchError> {
    let outcomes = run_grouped(items, opts.jobs, |item| {
        let label = item.label();
        progress.on_start(&label);
        let outcome = if reconciler.cancel_flag().is_cancelled() {
            Outcome::failure(FailureKind::Cancelled, "batch cancelled")
        } else {
            reconciler.reconcile(item.schema, &item.params, &item.intent)
        };
        progress.on_complete(&label, &outcome);
        outcome
    })?;

    let mut summary = ReconcileSummary::default();
    for outcome in &outcomes {
        summary.add_outcome(outcome);
    }
    Ok(BatchReport { outcomes, summary })
}

/// Decide every item without mutating anything
pub fn plan_all(
    reconciler: &Reconciler<'_>,
    items: &[BatchItem<'_>],
    jobs: usize,
) -> Result<Vec<Result<Decision, Failure>>, BatchError> {
    run_grouped(items, jobs, |item| {
        reconciler.plan(item.schema, &item.params, &item.intent)
    })
}
