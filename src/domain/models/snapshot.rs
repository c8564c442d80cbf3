//! Per-run immutable snapshots.
//!
//! Every model invocation gets its own [`RunSnapshot`] instead of sharing one
//! mutable experiment object across topologies and iterations.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::convergence::{ConvergenceRecord, TerminalState};
use super::experiment::{CouplingScheme, ExperimentConfig};
use super::run_key::RunLabel;

/// Where the interface boundary trajectory of a run comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum BoundaryInput {
    /// Configured restart fields (first iterate and naive runs).
    Initial {
        atmosphere: PathBuf,
        ocean: PathBuf,
    },
    /// Output of the previous SWR iterate.
    PreviousIteration { iteration: u32, directory: PathBuf },
}

/// Everything one model invocation needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Id shared by all runs of one controller/driver invocation.
    pub run_id: Uuid,
    pub experiment: Arc<ExperimentConfig>,
    pub cpl_scheme: CouplingScheme,
    pub label: RunLabel,
    pub run_directory: PathBuf,
    pub boundary: BoundaryInput,
}

impl RunSnapshot {
    pub fn new(
        run_id: Uuid,
        experiment: Arc<ExperimentConfig>,
        cpl_scheme: CouplingScheme,
        label: RunLabel,
        run_directory: PathBuf,
    ) -> Self {
        let boundary = experiment.initial_boundary();
        Self {
            run_id,
            experiment,
            cpl_scheme,
            label,
            run_directory,
            boundary,
        }
    }

    /// Replace the boundary input; all other fields stay as configured.
    pub fn with_boundary(mut self, boundary: BoundaryInput) -> Self {
        self.boundary = boundary;
        self
    }

    /// Point the snapshot at the directory the run is archived under.
    #[must_use]
    pub fn archived_at(mut self, directory: PathBuf) -> Self {
        self.run_directory = directory;
        self
    }

    pub fn exp_id(&self) -> &str {
        &self.experiment.exp_id
    }
}

impl ExperimentConfig {
    /// Snapshot of this experiment for one run with an explicit boundary input.
    pub fn snapshot(
        self: &Arc<Self>,
        run_id: Uuid,
        cpl_scheme: CouplingScheme,
        label: RunLabel,
        run_directory: PathBuf,
        boundary: BoundaryInput,
    ) -> RunSnapshot {
        RunSnapshot::new(run_id, Arc::clone(self), cpl_scheme, label, run_directory)
            .with_boundary(boundary)
    }

    /// The boundary input of every first iterate and naive run.
    pub fn initial_boundary(&self) -> BoundaryInput {
        BoundaryInput::Initial {
            atmosphere: self.inputs.atmosphere_boundary.clone(),
            ocean: self.inputs.ocean_boundary.clone(),
        }
    }
}

/// File written into every archived run directory.
pub const RECORD_FILE_NAME: &str = "swr_record.yaml";

/// Persisted setup and convergence state of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub snapshot: RunSnapshot,
    /// SWR runs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence: Option<ConvergenceRecord>,
    /// Set on the iterate that ended the loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalState>,
}
