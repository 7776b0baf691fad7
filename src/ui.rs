use colored::Colorize;
use reconcile::{Decision, Outcome};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Symbol for a planned decision
pub fn decision_symbol(decision: &Decision) -> colored::ColoredString {
    match decision {
        Decision::Create => "+".green(),
        Decision::Update => "~".yellow(),
        Decision::Destroy => "-".red(),
        Decision::Skip { .. } => "○".dimmed(),
    }
}

/// Symbol for a finished request
pub fn outcome_symbol(outcome: &Outcome) -> colored::ColoredString {
    match outcome {
        Outcome::Success(s) if s.changed => "✓".green(),
        Outcome::Success(_) => "○".dimmed(),
        Outcome::Failure(_) => "✗".red(),
    }
}

/// Print a value as pretty JSON on stdout
pub fn json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{FailureKind, ParameterSet};

    #[test]
    fn test_symbols() {
        colored::control::set_override(false);
        assert_eq!(decision_symbol(&Decision::Create).to_string(), "+");
        assert_eq!(decision_symbol(&Decision::Destroy).to_string(), "-");
        assert_eq!(
            decision_symbol(&Decision::Skip {
                found: true,
                attributes: ParameterSet::new()
            })
            .to_string(),
            "○"
        );
        assert_eq!(outcome_symbol(&Outcome::already_absent()).to_string(), "○");
        assert_eq!(
            outcome_symbol(&Outcome::failure(FailureKind::ProbeError, "x")).to_string(),
            "✗"
        );
    }
}
