//! Progress indicators for cloudstate CLI.

use crate::ui;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{Outcome, ProgressCallback};
use std::time::Duration;

/// Progress bar over a batch of requests
pub fn bar(len: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("  {prefix:.cyan.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Spinner for a single long-running request
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Reports batch progress on a bar, one line per finished request
pub struct BarProgress {
    bar: ProgressBar,
    quiet: bool,
}

impl BarProgress {
    pub fn new(len: usize, prefix: &str, quiet: bool) -> Self {
        let bar = if quiet || !console::Term::stderr().is_term() {
            ProgressBar::hidden()
        } else {
            bar(len as u64, prefix)
        };
        Self { bar, quiet }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for BarProgress {
    fn on_start(&self, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn on_complete(&self, label: &str, outcome: &Outcome) {
        let detail = match outcome {
            Outcome::Success(s) => match s.action {
                Some(action) => action.to_string(),
                None if s.found => "unchanged".to_string(),
                None => "absent".to_string(),
            },
            Outcome::Failure(f) => f.kind.to_string(),
        };
        let line = format!("    {} {label} {detail}", ui::outcome_symbol(outcome));
        if !self.bar.is_hidden() {
            self.bar.println(line);
        } else if !self.quiet {
            println!("{line}");
        }
        self.bar.inc(1);
    }
}
