//! Error taxonomy for the generation engine.
//!
//! Per-path failures are collected, never propagated across sibling paths:
//! a `ComposeError` belongs to exactly one target path, and a `BatchFailure`
//! carries every individual cause rather than a summary of them. Only a
//! `LoadError` aborts a batch outright, since no path-level work is possible
//! without a working sandbox.

use std::fmt;

use thiserror::Error;

use crate::sanitize::ContextError;
use crate::template::TemplateError;

/// The server bundle could not be executed or does not export a callable
/// render entry point. Fatal to the whole batch.
#[derive(Debug, Error)]
#[error("failed to load server bundle '{bundle}'")]
pub struct LoadError {
    pub bundle: String,
    #[source]
    pub source: anyhow::Error,
}

impl LoadError {
    pub fn new(bundle: impl fmt::Display, source: anyhow::Error) -> Self {
        Self {
            bundle: bundle.to_string(),
            source,
        }
    }
}

/// One path's render call was rejected inside the sandbox. Carries the
/// exception text exactly as the bundle raised it.
#[derive(Debug, Clone, Error)]
#[error("render entry threw for '{target_path}': {message}")]
pub struct RenderError {
    pub target_path: String,
    pub message: String,
}

/// Stage of the per-path pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeStage {
    Render,
    Template,
    Minify,
    Write,
}

impl fmt::Display for ComposeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComposeStage::Render => "render",
            ComposeStage::Template => "template",
            ComposeStage::Minify => "minify",
            ComposeStage::Write => "write",
        })
    }
}

/// Failure of one path's render/compose/minify/write chain, annotated with a
/// remediation hint when the cause looks like client-only code running on the
/// server.
#[derive(Debug)]
pub struct ComposeError {
    pub target_path: String,
    pub stage: ComposeStage,
    pub hint: Option<&'static str>,
    pub cause: anyhow::Error,
}

impl std::error::Error for ComposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for '{}': {:#}",
            self.stage, self.target_path, self.cause
        )?;
        if let Some(hint) = self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Aggregate of every per-path failure in a batch. One entry per failed
/// path; each entry keeps the original error object.
#[derive(Debug)]
pub struct BatchFailure {
    failures: Vec<ComposeError>,
}

impl std::error::Error for BatchFailure {}

impl BatchFailure {
    pub fn new(failures: Vec<ComposeError>) -> Self {
        Self { failures }
    }

    /// The individual causes, one per failed path.
    pub fn causes(&self) -> &[ComposeError] {
        &self.failures
    }

    pub fn failing_paths(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.target_path.as_str())
    }

    /// Multi-line report naming every failing path with its full cause.
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        for failure in &self.failures {
            out.push_str("\n  - ");
            out.push_str(&failure.to_string());
        }
        out
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<&str> = self.failing_paths().collect();
        write!(
            f,
            "static site generation failed for {} path(s): {}",
            paths.len(),
            paths.join(", ")
        )
    }
}

/// The only error surface of a batch invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Batch(#[from] BatchFailure),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn failure(path: &str, msg: &str) -> ComposeError {
        ComposeError {
            target_path: path.to_string(),
            stage: ComposeStage::Render,
            hint: None,
            cause: anyhow!("{msg}"),
        }
    }

    #[test]
    fn batch_failure_names_every_path() {
        let err = BatchFailure::new(vec![failure("/a", "boom"), failure("/b", "bust")]);
        let msg = err.to_string();
        assert!(msg.contains("2 path(s)"));
        assert!(msg.contains("/a"));
        assert!(msg.contains("/b"));
    }

    #[test]
    fn batch_failure_detail_keeps_causes() {
        let err = BatchFailure::new(vec![failure("/a", "boom")]);
        let detail = err.detail();
        assert!(detail.contains("render failed for '/a'"));
        assert!(detail.contains("boom"));
    }

    #[test]
    fn compose_error_appends_hint() {
        let mut err = failure("/a", "window is not defined");
        err.hint = Some("guard client-only code");
        let msg = err.to_string();
        assert!(msg.contains("window is not defined"));
        assert!(msg.contains("hint: guard client-only code"));
    }
}
