//! Naive Coupling Driver
//!
//! Baseline for the SWR runs: one model run per coupling topology, no
//! iteration, no convergence measurement. Debug output is pruned before each
//! run is archived.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::output_reduction::OutputReducer;
use super::run_directory::RunDirectoryManager;
use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{CouplingScheme, ExperimentConfig, RunKey, RunLabel, RunRecord};
use crate::domain::ports::{CancelHandle, ConfigRenderer, ModelRunner, RunContext};

/// Archived output of one topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NaiveRun {
    pub scheme: CouplingScheme,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NaiveOutcome {
    pub run_id: Uuid,
    pub exp_id: String,
    /// In execution order.
    pub runs: Vec<NaiveRun>,
    /// Set when cancellation stopped the driver before every topology ran.
    pub cancelled: bool,
}

/// Runs parallel, atm-first and oce-first once each.
pub struct NaiveCouplingDriver {
    experiment: Arc<ExperimentConfig>,
    runner: Arc<dyn ModelRunner>,
    renderer: Arc<dyn ConfigRenderer>,
    directories: Arc<RunDirectoryManager>,
    reducer: OutputReducer,
    cancel: CancelHandle,
}

impl NaiveCouplingDriver {
    pub fn new(
        experiment: Arc<ExperimentConfig>,
        runner: Arc<dyn ModelRunner>,
        renderer: Arc<dyn ConfigRenderer>,
        directories: Arc<RunDirectoryManager>,
    ) -> Self {
        Self {
            experiment,
            runner,
            renderer,
            directories,
            reducer: OutputReducer::default(),
            cancel: CancelHandle::new(),
        }
    }

    #[must_use]
    pub fn with_output_reduction(mut self, reducer: OutputReducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    #[instrument(skip(self), fields(exp_id = %self.experiment.exp_id))]
    pub async fn run(&self) -> CouplingResult<NaiveOutcome> {
        let exp_id = &self.experiment.exp_id;
        self.directories.ensure_fresh(exp_id).await?;

        let run_id = Uuid::new_v4();
        let mut runs = Vec::with_capacity(CouplingScheme::ALL.len());

        for scheme in CouplingScheme::ALL {
            if self.cancel.is_cancelled() {
                info!(completed = runs.len(), "Cancellation requested, skipping remaining topologies");
                return Ok(NaiveOutcome {
                    run_id,
                    exp_id: exp_id.clone(),
                    runs,
                    cancelled: true,
                });
            }

            let label = RunLabel::Topology(scheme);
            let directory = self.directories.acquire(exp_id).await?;
            let snapshot = self.experiment.snapshot(
                run_id,
                scheme,
                label,
                directory.clone(),
                self.experiment.initial_boundary(),
            );
            info!(scheme = %scheme, code = scheme.code(), directory = %directory.display(), "Naive run started");

            if let Err(source) = self.renderer.render(&snapshot).await {
                self.directories.discard(&directory).await?;
                return Err(CouplingError::RenderFailed { run: label, source });
            }

            let ctx = RunContext {
                cancel: self.cancel.signal(),
            };
            if let Err(source) = self.runner.run(&snapshot, ctx).await {
                self.directories.discard(&directory).await?;
                if self.cancel.is_cancelled() {
                    info!(scheme = %scheme, error = %source, "Naive run aborted by cancellation");
                    return Ok(NaiveOutcome {
                        run_id,
                        exp_id: exp_id.clone(),
                        runs,
                        cancelled: true,
                    });
                }
                warn!(scheme = %scheme, error = %source, "Naive run failed");
                return Err(CouplingError::ModelRunFailure { run: label, source });
            }

            let key = RunKey::topology(exp_id, scheme);
            self.reducer.reduce(&directory).await?;
            let record = RunRecord {
                snapshot: snapshot.archived_at(self.directories.destination_for(&key)),
                convergence: None,
                terminal: None,
            };
            self.directories.write_record(&directory, &record).await?;
            let archived = self.directories.archive_run(&directory, key).await?;
            info!(scheme = %scheme, directory = %archived.display(), "Naive run archived");

            runs.push(NaiveRun {
                scheme,
                directory: archived,
            });
        }

        Ok(NaiveOutcome {
            run_id,
            exp_id: exp_id.clone(),
            runs,
            cancelled: false,
        })
    }
}
