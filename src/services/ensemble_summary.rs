//! Ensemble summary
//!
//! Reads the persisted records of many SWR experiments below one output
//! root back in and classifies them, the way ensemble post-processing counts
//! non-converged start dates and iteration statistics.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::run_directory::read_record;
use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{NormKind, RunRecord, TerminalState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Final iterate converged under every norm.
    Converged,
    /// Budget exhausted without convergence.
    NotConverged,
    /// Loop ended by failure or cancellation.
    Incomplete,
}

/// Classification of one experiment from its final archived iterate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub exp_id: String,
    /// Start of the simulated window; ensemble members differ by this date.
    pub run_start_date: NaiveDateTime,
    pub iterations: u32,
    pub status: ExperimentStatus,
    /// Latest 2-norm value, if any was measured.
    pub two_norm: Option<f64>,
    /// Latest inf-norm value, if any was measured.
    pub inf_norm: Option<f64>,
    pub directory: PathBuf,
}

/// Iteration counts of the converged experiments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub max: u32,
}

impl IterationStats {
    /// `None` for an empty sample.
    pub fn from_counts(counts: &[u32]) -> Option<Self> {
        if counts.is_empty() {
            return None;
        }
        let mut sorted = counts.to_vec();
        sorted.sort_unstable();
        let count = sorted.len();
        let mean = sorted.iter().map(|n| f64::from(*n)).sum::<f64>() / count as f64;
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0
        } else {
            f64::from(sorted[mid])
        };
        Some(Self {
            count,
            mean,
            median,
            max: sorted[count - 1],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSummary {
    pub experiments: Vec<ExperimentSummary>,
    pub converged: usize,
    pub not_converged: usize,
    pub incomplete: usize,
    pub iteration_stats: Option<IterationStats>,
}

impl EnsembleSummary {
    /// Start dates of the experiments that did not converge, in order.
    pub fn non_converged_start_dates(&self) -> Vec<NaiveDateTime> {
        let mut dates: Vec<NaiveDateTime> = self
            .experiments
            .iter()
            .filter(|e| e.status != ExperimentStatus::Converged)
            .map(|e| e.run_start_date)
            .collect();
        dates.sort_unstable();
        dates
    }
}

/// Scan every experiment directory below `root`.
///
/// Directories without `iter_<n>` subdirectories (naive runs, unrelated
/// folders) are skipped, as are hidden ones such as the staging area.
pub async fn summarize(root: &Path) -> CouplingResult<EnsembleSummary> {
    let mut experiments = Vec::new();
    for exp_dir in subdirectories(root).await? {
        let hidden = exp_dir
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if hidden {
            continue;
        }
        let Some(final_dir) = final_iterate(&exp_dir).await? else {
            debug!(path = %exp_dir.display(), "No SWR iterates, skipping");
            continue;
        };
        match read_record(&final_dir).await {
            Ok(record) => experiments.push(classify(&record, final_dir)),
            Err(err) => warn!(path = %final_dir.display(), error = %err, "Unreadable record, skipping"),
        }
    }
    experiments.sort_by(|a, b| a.exp_id.cmp(&b.exp_id));

    let count = |status: ExperimentStatus| experiments.iter().filter(|e| e.status == status).count();
    let converged_iterations: Vec<u32> = experiments
        .iter()
        .filter(|e| e.status == ExperimentStatus::Converged)
        .map(|e| e.iterations)
        .collect();

    Ok(EnsembleSummary {
        converged: count(ExperimentStatus::Converged),
        not_converged: count(ExperimentStatus::NotConverged),
        incomplete: count(ExperimentStatus::Incomplete),
        iteration_stats: IterationStats::from_counts(&converged_iterations),
        experiments,
    })
}

fn classify(record: &RunRecord, directory: PathBuf) -> ExperimentSummary {
    let convergence = record.convergence.as_ref();
    let converged = convergence.is_some_and(|c| c.converged && c.all_passed());
    let status = match record.terminal {
        Some(TerminalState::Converged) if converged => ExperimentStatus::Converged,
        Some(TerminalState::Converged | TerminalState::Exhausted) => ExperimentStatus::NotConverged,
        Some(TerminalState::Cancelled) | None => ExperimentStatus::Incomplete,
    };
    let norm = |kind: NormKind| convergence.and_then(|c| c.norms.get(&kind)).map(|s| s.value);

    ExperimentSummary {
        exp_id: record.snapshot.experiment.exp_id.clone(),
        run_start_date: record.snapshot.experiment.run_start_date,
        iterations: convergence.map_or(0, |c| c.iteration),
        status,
        two_norm: norm(NormKind::Euclidean),
        inf_norm: norm(NormKind::Maximum),
        directory,
    }
}

/// Highest-numbered `iter_<n>` directory of one experiment.
async fn final_iterate(exp_dir: &Path) -> CouplingResult<Option<PathBuf>> {
    let mut best: Option<(u32, PathBuf)> = None;
    for dir in subdirectories(exp_dir).await? {
        let Some(n) = dir
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix("iter_"))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        if best.as_ref().is_none_or(|(current, _)| n > *current) {
            best = Some((n, dir));
        }
    }
    Ok(best.map(|(_, dir)| dir))
}

async fn subdirectories(dir: &Path) -> CouplingResult<Vec<PathBuf>> {
    let read_err = |e: std::io::Error| CouplingError::io(format!("reading {}", dir.display()), e);
    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        if entry.file_type().await.map_err(read_err)?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}
