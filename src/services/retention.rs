//! Caller-side cleanup of archived SWR iterates.
//!
//! The controller keeps every iterate; experiment drivers usually only need
//! the last one, plus the first iterate as the uncoupled (parallel) baseline.

use std::path::PathBuf;

use tracing::info;

use super::run_directory::RunDirectoryManager;
use crate::domain::errors::CouplingResult;
use crate::domain::models::{RetentionPolicy, SwrOutcome};

/// Discard the iterates of `outcome` that `policy` does not keep.
///
/// Returns the removed directories. Failed iterates are not part of the
/// outcome and are never touched.
pub async fn apply_retention(
    directories: &RunDirectoryManager,
    outcome: &SwrOutcome,
    policy: RetentionPolicy,
) -> CouplingResult<Vec<PathBuf>> {
    let last = outcome.iterations.len().saturating_sub(1);
    let keep = |idx: usize| match policy {
        RetentionPolicy::KeepAll => true,
        RetentionPolicy::KeepFinal => idx == last,
        RetentionPolicy::KeepFirstAndFinal => idx == 0 || idx == last,
    };

    let mut removed = Vec::new();
    for (idx, iteration) in outcome.iterations.iter().enumerate() {
        if keep(idx) {
            continue;
        }
        directories.discard(&iteration.directory).await?;
        removed.push(iteration.directory.clone());
    }

    if !removed.is_empty() {
        info!(
            exp_id = %outcome.exp_id,
            policy = ?policy,
            removed = removed.len(),
            "Retention policy applied"
        );
    }
    Ok(removed)
}
