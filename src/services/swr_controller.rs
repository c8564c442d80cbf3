//! SWR Controller
//!
//! Drives the Schwarz waveform relaxation loop: run the coupled model over
//! the same window again and again, feeding each iterate the previous one's
//! interface output, until two consecutive interface trajectories agree
//! within tolerance or the iteration budget is spent.
//!
//! ```text
//! Init -> Running(1) -> Running(2) -> ... -> Converged | Exhausted | Cancelled
//! ```
//!
//! Every executed iteration ends up archived as `<exp_id>/iter_<n>` with its
//! `swr_record.yaml`, after debug output has been pruned. The record's
//! snapshot names the archived directory, not the staging one. The
//! controller never deletes archived iterates; see `services::retention` for
//! caller-side cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::convergence_monitor::ConvergenceMonitor;
use super::output_reduction::OutputReducer;
use super::run_directory::RunDirectoryManager;
use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{
    BoundaryInput, ConvergenceRecord, CouplingScheme, ExperimentConfig, IterationRecord, RunKey,
    RunLabel, RunRecord, RunSnapshot, SwrOutcome, SwrParams, SwrState, TerminalState, Trajectory,
};
use crate::domain::ports::{CancelHandle, ConfigRenderer, ModelRunner, RunContext, TrajectoryExtractor};

/// Iterate-run-measure-decide loop for one experiment.
///
/// Iterations are strictly sequential; iterate `i` consumes the archived
/// output of iterate `i - 1`. Every iterate uses the parallel coupling
/// topology, only its boundary input changes.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use swr_coupler::domain::models::{ExperimentConfig, SwrParams};
/// # use swr_coupler::domain::ports::{ConfigRenderer, ModelRunner, TrajectoryExtractor};
/// # use swr_coupler::services::{RunDirectoryManager, SwrController};
/// # async fn example(
/// #     experiment: ExperimentConfig,
/// #     runner: Arc<dyn ModelRunner>,
/// #     extractor: Arc<dyn TrajectoryExtractor>,
/// #     renderer: Arc<dyn ConfigRenderer>,
/// # ) -> anyhow::Result<()> {
/// let directories = Arc::new(RunDirectoryManager::new("output"));
/// let controller = SwrController::new(Arc::new(experiment), runner, extractor, renderer, directories);
/// let outcome = controller.run(SwrParams::new(10, 1e-5)).await?;
/// println!("{} after {} iterations", outcome.state, outcome.final_iteration());
/// # Ok(())
/// # }
/// ```
pub struct SwrController {
    experiment: Arc<ExperimentConfig>,
    runner: Arc<dyn ModelRunner>,
    extractor: Arc<dyn TrajectoryExtractor>,
    renderer: Arc<dyn ConfigRenderer>,
    directories: Arc<RunDirectoryManager>,
    monitor: ConvergenceMonitor,
    reducer: OutputReducer,
    state: RwLock<SwrState>,
    cancel: CancelHandle,
}

/// A model run that finished and whose trajectory was read back.
struct CompletedRun {
    directory: PathBuf,
    snapshot: RunSnapshot,
    trajectory: Trajectory,
}

/// What the loop carries from one iterate to the next.
struct Previous {
    iteration: u32,
    directory: PathBuf,
    trajectory: Trajectory,
}

impl SwrController {
    pub fn new(
        experiment: Arc<ExperimentConfig>,
        runner: Arc<dyn ModelRunner>,
        extractor: Arc<dyn TrajectoryExtractor>,
        renderer: Arc<dyn ConfigRenderer>,
        directories: Arc<RunDirectoryManager>,
    ) -> Self {
        Self {
            experiment,
            runner,
            extractor,
            renderer,
            directories,
            monitor: ConvergenceMonitor::new(),
            reducer: OutputReducer::default(),
            state: RwLock::new(SwrState::Init),
            cancel: CancelHandle::new(),
        }
    }

    /// Replace the default debug output pruning.
    #[must_use]
    pub fn with_output_reduction(mut self, reducer: OutputReducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn experiment(&self) -> &Arc<ExperimentConfig> {
        &self.experiment
    }

    pub async fn state(&self) -> SwrState {
        *self.state.read().await
    }

    /// Handle for requesting cancellation from another task.
    ///
    /// Cancellation is honoured between iterations. A runner that aborts on
    /// the signal ends the loop as `Cancelled` and its partial output is
    /// discarded. An iterate that completes after cancellation was requested
    /// is measured and archived but never counts as converged.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run the loop until convergence, budget exhaustion or cancellation.
    ///
    /// # Errors
    ///
    /// - `Validation` for bad parameters, before anything touches disk
    /// - `DirectoryConflict` if the experiment already has archived runs
    /// - `ModelRunFailure`, `ExtractionFailed`, `RenderFailed` or
    ///   `TrajectoryMismatch` for the iteration that failed; earlier
    ///   iterations stay archived
    #[instrument(skip(self), fields(exp_id = %self.experiment.exp_id))]
    pub async fn run(&self, params: SwrParams) -> CouplingResult<SwrOutcome> {
        params.validate()?;
        *self.state.write().await = SwrState::Init;
        self.directories.ensure_fresh(&self.experiment.exp_id).await?;

        let run_id = Uuid::new_v4();
        let mut record = ConvergenceRecord::new(params.rel_tol);
        let mut iterations: Vec<IterationRecord> = Vec::new();
        let mut previous: Option<Previous> = None;

        info!(
            run_id = %run_id,
            max_iters = params.max_iters,
            rel_tol = params.rel_tol,
            stop_at_convergence = params.stop_at_convergence,
            "Starting SWR loop"
        );

        let mut iteration = 0;
        loop {
            if self.cancel.is_cancelled() {
                info!(completed = iteration, "Cancellation requested, not starting another iteration");
                return Ok(self
                    .finish(run_id, TerminalState::Cancelled, record, iterations)
                    .await);
            }

            iteration += 1;
            *self.state.write().await = SwrState::Running { iteration };

            let boundary = match &previous {
                None => self.experiment.initial_boundary(),
                Some(prev) => BoundaryInput::PreviousIteration {
                    iteration: prev.iteration,
                    directory: prev.directory.clone(),
                },
            };

            let Some(CompletedRun {
                directory,
                snapshot,
                trajectory,
            }) = self.execute_iteration(run_id, iteration, boundary, &record).await?
            else {
                return Ok(self
                    .finish(run_id, TerminalState::Cancelled, record, iterations)
                    .await);
            };

            let norms = match &previous {
                None => None,
                Some(prev) => match self.monitor.measure(&prev.trajectory, &trajectory) {
                    Ok(norms) => Some(norms),
                    Err(err) => {
                        self.archive_failed(&directory, &snapshot, &record).await;
                        return Err(err);
                    }
                },
            };
            let cancelled = self.cancel.is_cancelled();
            let converged = !cancelled
                && norms
                    .as_ref()
                    .is_some_and(|norms| self.monitor.has_converged(norms, params.rel_tol));
            record.update(iteration, norms.as_ref(), converged);

            let terminal = if cancelled {
                Some(TerminalState::Cancelled)
            } else if converged && params.stop_at_convergence {
                Some(TerminalState::Converged)
            } else if iteration == params.max_iters {
                Some(if converged {
                    TerminalState::Converged
                } else {
                    TerminalState::Exhausted
                })
            } else {
                None
            };

            info!(
                iteration,
                norms = ?norms,
                converged,
                "Iteration measured"
            );

            let key = RunKey::iteration(&self.experiment.exp_id, iteration);
            self.reducer.reduce(&directory).await?;
            let run_record = RunRecord {
                snapshot: snapshot.archived_at(self.directories.destination_for(&key)),
                convergence: Some(record.clone()),
                terminal,
            };
            self.directories.write_record(&directory, &run_record).await?;
            let archived = self.directories.archive_run(&directory, key).await?;
            info!(iteration, directory = %archived.display(), "Iteration archived");

            iterations.push(IterationRecord {
                iteration,
                directory: archived.clone(),
                norms,
                converged,
                finished_at: Utc::now(),
            });

            if let Some(terminal) = terminal {
                return Ok(self.finish(run_id, terminal, record, iterations).await);
            }

            previous = Some(Previous {
                iteration,
                directory: archived,
                trajectory,
            });
        }
    }

    /// Render, run and extract one iterate inside a freshly acquired
    /// directory. `Ok(None)` means the runner aborted on cancellation.
    async fn execute_iteration(
        &self,
        run_id: Uuid,
        iteration: u32,
        boundary: BoundaryInput,
        record: &ConvergenceRecord,
    ) -> CouplingResult<Option<CompletedRun>> {
        let label = RunLabel::Iteration(iteration);
        let directory = self.directories.acquire(&self.experiment.exp_id).await?;
        debug!(iteration, directory = %directory.display(), "Iteration started");

        let snapshot = self.experiment.snapshot(
            run_id,
            CouplingScheme::Parallel,
            label,
            directory.clone(),
            boundary,
        );

        if let Err(source) = self.renderer.render(&snapshot).await {
            self.directories.discard(&directory).await?;
            return Err(CouplingError::RenderFailed { run: label, source });
        }

        let ctx = RunContext {
            cancel: self.cancel.signal(),
        };
        let artifacts = match self.runner.run(&snapshot, ctx).await {
            Ok(artifacts) => artifacts,
            Err(source) if self.cancel.is_cancelled() => {
                info!(iteration, error = %source, "Model run aborted by cancellation");
                self.directories.discard(&directory).await?;
                return Ok(None);
            }
            Err(source) => {
                warn!(iteration, error = %source, "Model run failed");
                self.archive_failed(&directory, &snapshot, record).await;
                return Err(CouplingError::ModelRunFailure { run: label, source });
            }
        };

        match self.extractor.extract(&artifacts).await {
            Ok(trajectory) => Ok(Some(CompletedRun {
                directory,
                snapshot,
                trajectory,
            })),
            Err(source) => {
                self.archive_failed(&directory, &snapshot, record).await;
                Err(CouplingError::ExtractionFailed { run: label, source })
            }
        }
    }

    /// Keep whatever a failed iterate produced as `failed_iter_<n>`.
    ///
    /// Problems here are logged only; the caller reports the original failure.
    async fn archive_failed(&self, directory: &Path, snapshot: &RunSnapshot, record: &ConvergenceRecord) {
        let Some(iteration) = snapshot.label.iteration() else {
            return;
        };
        let key = RunKey::new(&self.experiment.exp_id, RunLabel::FailedIteration(iteration));
        let run_record = RunRecord {
            snapshot: snapshot.clone().archived_at(self.directories.destination_for(&key)),
            convergence: Some(record.clone()),
            terminal: None,
        };
        if let Err(err) = self.directories.write_record(directory, &run_record).await {
            warn!(iteration, error = %err, "Could not write record of failed iteration");
        }
        match self.directories.archive_run(directory, key).await {
            Ok(path) => warn!(iteration, directory = %path.display(), "Failed iteration archived"),
            Err(err) => warn!(iteration, error = %err, "Could not archive failed iteration"),
        }
    }

    async fn finish(
        &self,
        run_id: Uuid,
        state: TerminalState,
        record: ConvergenceRecord,
        iterations: Vec<IterationRecord>,
    ) -> SwrOutcome {
        *self.state.write().await = state.into();
        info!(
            run_id = %run_id,
            state = %state,
            iterations = record.iteration,
            converged = record.converged,
            "SWR loop finished"
        );
        SwrOutcome {
            run_id,
            exp_id: self.experiment.exp_id.clone(),
            state,
            record,
            iterations,
        }
    }
}
