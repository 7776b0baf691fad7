//! Result normalization - raw engine output to [`Outcome`]

use crate::types::{EngineInvocationResult, Failure, FailureKind, Outcome, ParameterSet, Success};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ANSI pattern is valid")
});

/// Source-location lines Terraform prints under a diagnostic
static CONTEXT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(with \S+,?$|on \S+ line \d+|\d+:\s|\(and \d+ more similar)")
        .expect("context pattern is valid")
});

static ERROR_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*(?:\[ERROR\]|Error:|error:)\s*)+").expect("prefix pattern is valid")
});

/// Map a raw engine result to an outcome.
///
/// Success carries the attributes parsed from stdout. Failure carries the
/// diagnostic extracted from stderr and the raw result.
pub fn normalize(result: EngineInvocationResult) -> Outcome {
    if result.is_success() {
        return Outcome::Success(Success {
            changed: true,
            action: None,
            found: true,
            attributes: parse_attributes(&result.stdout),
        });
    }

    let message = error_message(&result);
    log::trace!("engine stderr: {}", result.stderr);
    Outcome::Failure(Failure::new(FailureKind::EngineInvocationFailed, message).with_raw(result))
}

/// Parse an attribute map from engine stdout.
///
/// Empty output is an empty map. Anything that is not a JSON object is kept
/// under the single `output` attribute.
pub fn parse_attributes(stdout: &str) -> ParameterSet {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return ParameterSet::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => ParameterSet::new(),
        Ok(other) => single_output(other),
        Err(_) => single_output(Value::String(trimmed.to_string())),
    }
}

fn single_output(value: Value) -> ParameterSet {
    let mut map = ParameterSet::new();
    map.insert("output".to_string(), value);
    map
}

/// Human-readable message for a failed engine call
pub fn error_message(result: &EngineInvocationResult) -> String {
    if let Some(diagnostic) = extract_diagnostic(&result.stderr) {
        return diagnostic;
    }
    if result.stderr.trim().is_empty() {
        format!("engine exited with status {}", result.exit_code)
    } else {
        result.stderr.clone()
    }
}

/// Pull the innermost diagnostic text out of Terraform stderr.
///
/// Returns `None` when no `Error:` diagnostic is recognizable.
pub fn extract_diagnostic(stderr: &str) -> Option<String> {
    let clean = ANSI.replace_all(stderr, "");
    let lines: Vec<&str> = clean.lines().map(strip_frame).collect();

    let mut diagnostics = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;
        if !line.starts_with("Error:") {
            continue;
        }

        let mut parts = Vec::new();
        let summary = strip_prefixes(line);
        if !summary.is_empty() {
            parts.push(summary);
        }
        while i < lines.len() && !is_diagnostic_start(lines[i]) {
            let detail = lines[i];
            i += 1;
            if detail.is_empty() || CONTEXT_LINE.is_match(detail) {
                continue;
            }
            let detail = strip_prefixes(detail);
            if !detail.is_empty() && !parts.contains(&detail) {
                parts.push(detail);
            }
        }
        if !parts.is_empty() {
            diagnostics.push(parts.join(": "));
        }
    }

    if diagnostics.is_empty() {
        None
    } else {
        Some(diagnostics.join("\n"))
    }
}

fn strip_frame(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['╷', '│', '╵'])
        .trim()
}

fn strip_prefixes(line: &str) -> String {
    ERROR_PREFIX.replace(line, "").trim().to_string()
}

fn is_diagnostic_start(line: &str) -> bool {
    line.starts_with("Error:") || line.starts_with("Warning:")
}
