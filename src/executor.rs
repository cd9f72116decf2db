//! Bounded fan-out executor.
//!
//! Drives N independent units of work with a hard ceiling on how many are in
//! flight at once. Each request settles into exactly one `PathOutcome`; a
//! failed unit becomes a `Failure` outcome instead of propagating, so one
//! path can never prevent a sibling from being attempted. No retries, no
//! cancellation: every submitted request runs to completion.

use crate::compose::PageData;
use crate::error::ComposeError;
use crate::sandbox::RenderRequest;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::future::Future;

/// The settled result for one request. Attributable back to its originating
/// path whichever order completion happened in.
#[derive(Debug)]
pub enum PathOutcome {
    Success {
        target_path: String,
        collected: Value,
        warnings: Vec<String>,
    },
    Failure {
        target_path: String,
        error: ComposeError,
    },
}

impl PathOutcome {
    pub fn target_path(&self) -> &str {
        match self {
            PathOutcome::Success { target_path, .. } => target_path,
            PathOutcome::Failure { target_path, .. } => target_path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PathOutcome::Success { .. })
    }
}

/// Default in-flight ceiling: a small multiple of available parallelism.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 4
}

/// Runs every request through `work` with at most `limit` in flight.
///
/// Output order follows completion, not submission; the 1:1 mapping from
/// request to outcome is preserved via the target path carried on each.
pub async fn run_all<W, Fut>(
    requests: Vec<RenderRequest>,
    limit: usize,
    work: W,
) -> Vec<PathOutcome>
where
    W: Fn(RenderRequest) -> Fut,
    Fut: Future<Output = Result<PageData, ComposeError>>,
{
    let limit = limit.max(1);
    stream::iter(requests.into_iter().map(|request| {
        let target_path = request.target_path.clone();
        let unit = work(request);
        async move {
            match unit.await {
                Ok(page) => PathOutcome::Success {
                    target_path,
                    collected: page.collected,
                    warnings: page.warnings,
                },
                Err(error) => PathOutcome::Failure { target_path, error },
            }
        }
    }))
    .buffer_unordered(limit)
    .collect()
    .await
}
