//! Outcome aggregator - the single verdict for a batch.
//!
//! Partitions the per-path outcomes: any failure turns the whole batch into
//! one `BatchFailure` that keeps every individual cause; full success yields
//! the path -> collected-data map, one entry per requested path.

use crate::error::BatchFailure;
use crate::executor::PathOutcome;
use serde_json::Value;
use std::collections::BTreeMap;

/// The successful batch artifact returned to the caller.
#[derive(Debug)]
pub struct BatchResult {
    pub collected_by_path: BTreeMap<String, Value>,
}

/// Reduces settled outcomes to one `BatchResult` or one `BatchFailure`.
pub fn aggregate(outcomes: Vec<PathOutcome>) -> Result<BatchResult, BatchFailure> {
    let mut collected_by_path = BTreeMap::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome {
            PathOutcome::Success {
                target_path,
                collected,
                ..
            } => {
                collected_by_path.insert(target_path, collected);
            }
            PathOutcome::Failure { error, .. } => failures.push(error),
        }
    }

    if failures.is_empty() {
        Ok(BatchResult { collected_by_path })
    } else {
        Err(BatchFailure::new(failures))
    }
}
