//! Warning filter and reporter.
//!
//! Minifier warnings are advisory: they are filtered against a fixed
//! ignore-list of known-benign messages and, if anything remains, reported
//! once per batch as a consolidated summary naming each affected path. The
//! summary never affects the batch verdict. The escape hatch suppresses the
//! summary entirely for environments where the diagnostics are noise.

use crate::executor::PathOutcome;

/// Substrings of minifier warnings that carry no action for the author.
pub const KNOWN_BENIGN_WARNINGS: &[&str] =
    &["preserved important comment", "conditional comment retained"];

/// Drops warnings matching the ignore-list.
pub fn filter_benign(warnings: &[String]) -> Vec<String> {
    warnings
        .iter()
        .filter(|warning| !KNOWN_BENIGN_WARNINGS.iter().any(|b| warning.contains(b)))
        .cloned()
        .collect()
}

/// Builds the consolidated summary, or `None` when no path has actionable
/// warnings. Warnings stay attributed per path; the same underlying issue on
/// two paths is listed under both.
pub fn warning_summary(outcomes: &[PathOutcome]) -> Option<String> {
    let mut affected = 0;
    let mut lines = Vec::new();
    for outcome in outcomes {
        if let PathOutcome::Success {
            target_path,
            warnings,
            ..
        } = outcome
        {
            let kept = filter_benign(warnings);
            if kept.is_empty() {
                continue;
            }
            affected += 1;
            lines.push(format!("- {target_path}:"));
            for warning in kept {
                lines.push(format!("    {warning}"));
            }
        }
    }

    if affected == 0 {
        None
    } else {
        Some(format!(
            "{affected} path(s) produced minifier warnings:\n{}",
            lines.join("\n")
        ))
    }
}

/// Emits the summary through the log stream. Pure side effect; never fails,
/// never aborts the batch.
pub fn report_warnings(outcomes: &[PathOutcome], suppress_summary: bool) {
    if suppress_summary {
        return;
    }
    if let Some(summary) = warning_summary(outcomes) {
        tracing::warn!("{summary}");
    }
}
