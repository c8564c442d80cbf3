//! Common test utilities for integration tests
//!
//! Provides a deterministic scripted model runner, a recording renderer and
//! experiment fixtures shared by the integration test files.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use swr_coupler::adapters::json_extractor::DEFAULT_TRAJECTORY_FILE;
use swr_coupler::adapters::{JsonTrajectoryExtractor, YamlConfigRenderer};
use swr_coupler::domain::models::{ExperimentConfig, ExperimentDefinition, RunLabel, RunSnapshot, Trajectory};
use swr_coupler::domain::ports::{
    CancelHandle, ConfigRenderer, ModelRunner, RunArtifacts, RunContext, TrajectoryExtractor,
};
use swr_coupler::services::{RunDirectoryManager, SwrController};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn experiment_yaml(exp_id: &str) -> String {
    format!(
        r"
exp_id: {exp_id}
dt_cpl: 3600
dt_atmosphere: 900
dt_ocean: 1800
run_start_date: 2014-07-02T06:00:00
run_end_date: 2014-07-03T06:00:00
inputs:
  ocean_restart: restart/nemo_restart.nc
  atmosphere_forcing: forcing/oifs_forcing.nc
  atmosphere_boundary: restart/rstas.nc
  ocean_boundary: restart/rstos.nc
forcing:
  start: 2014-07-01T00:00:00
  frequency_hours: 6
"
    )
}

pub fn experiment(exp_id: &str) -> Arc<ExperimentConfig> {
    let definition = ExperimentDefinition::from_yaml(&experiment_yaml(exp_id)).unwrap();
    Arc::new(ExperimentConfig::from_definition(definition).unwrap())
}

fn hour(h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2014, 7, 2)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

/// One trajectory per value: a flat `sst` series on a three-sample grid.
pub fn flat_trajectories(values: &[f64]) -> Vec<Trajectory> {
    values
        .iter()
        .map(|v| Trajectory::new(vec![hour(6), hour(7), hour(8)]).with_quantity("sst", vec![*v; 3]))
        .collect()
}

/// Successive iterates approach 11.12 and pass a 1e-3 tolerance from the 4th on.
pub const CONVERGING: [f64; 4] = [10.0, 11.0, 11.11, 11.12];

/// Reaches a 1e-3 tolerance exactly at the 3rd iterate.
pub const CONVERGING_AT_THIRD: [f64; 3] = [10.0, 11.0, 11.005];

/// Coupler trace every scripted run writes.
pub const DEBUG_TRACE: &str = "debug.root.01";

/// Never settles.
pub const OSCILLATING: [f64; 2] = [10.0, 20.0];

/// What the scripted runner does on one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    Succeed,
    Fail,
    /// Request cancellation, then finish normally.
    CancelAndSucceed,
    /// Request cancellation and abort like a killed model would.
    CancelAndAbort,
}

/// Deterministic stand-in for the coupled model.
///
/// Call `n` (1-based) writes trajectory `n - 1` (the last one once the list
/// runs out) as the JSON interface file, so the real extractor can read it.
/// Every call also leaves an OASIS style `debug.root.01` trace behind.
pub struct ScriptedRunner {
    trajectories: Vec<Trajectory>,
    actions: Mutex<Vec<(usize, CallAction)>>,
    cancel: Mutex<Option<CancelHandle>>,
    calls: Mutex<Vec<RunSnapshot>>,
}

impl ScriptedRunner {
    pub fn new(trajectories: Vec<Trajectory>) -> Self {
        assert!(!trajectories.is_empty());
        Self {
            trajectories,
            actions: Mutex::new(Vec::new()),
            cancel: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(values: &[f64]) -> Self {
        let cycle: Vec<f64> = values.iter().copied().cycle().take(64).collect();
        Self::new(flat_trajectories(&cycle))
    }

    pub fn converging() -> Self {
        Self::new(flat_trajectories(&CONVERGING))
    }

    pub fn with_action(self, call: usize, action: CallAction) -> Self {
        self.actions.lock().unwrap().push((call, action));
        self
    }

    /// Handle used by the cancelling actions.
    pub fn set_cancel_handle(&self, handle: CancelHandle) {
        *self.cancel.lock().unwrap() = Some(handle);
    }

    pub fn calls(&self) -> Vec<RunSnapshot> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn action_for(&self, call: usize) -> CallAction {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| *n == call)
            .map_or(CallAction::Succeed, |(_, action)| *action)
    }

    fn request_cancel(&self) {
        if let Some(handle) = self.cancel.lock().unwrap().as_ref() {
            handle.cancel();
        }
    }
}

#[async_trait]
impl ModelRunner for ScriptedRunner {
    async fn run(&self, snapshot: &RunSnapshot, mut ctx: RunContext) -> Result<RunArtifacts> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(snapshot.clone());
            calls.len()
        };
        let dir = &snapshot.run_directory;
        tokio::fs::write(dir.join("ocean_output.nc"), format!("call {call}")).await?;
        tokio::fs::write(dir.join(DEBUG_TRACE), format!("coupler trace {call}")).await?;

        match self.action_for(call) {
            CallAction::Fail => bail!("model crashed on call {call}"),
            CallAction::CancelAndAbort => {
                self.request_cancel();
                ctx.cancel.cancelled().await;
                bail!("model killed on call {call}");
            }
            CallAction::CancelAndSucceed => self.request_cancel(),
            CallAction::Succeed => {}
        }

        let idx = (call - 1).min(self.trajectories.len() - 1);
        let json = serde_json::to_string(&self.trajectories[idx])?;
        tokio::fs::write(dir.join(DEFAULT_TRAJECTORY_FILE), json).await?;

        Ok(RunArtifacts::new(dir.clone()))
    }
}

/// Renders through the YAML renderer and records which runs were rendered.
#[derive(Default)]
pub struct RecordingRenderer {
    inner: YamlConfigRenderer,
    rendered: Mutex<Vec<RunLabel>>,
    fail: bool,
}

impl RecordingRenderer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn rendered(&self) -> Vec<RunLabel> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigRenderer for RecordingRenderer {
    async fn render(&self, snapshot: &RunSnapshot) -> Result<()> {
        if self.fail {
            bail!("template error");
        }
        self.rendered.lock().unwrap().push(snapshot.label);
        self.inner.render(snapshot).await
    }
}

/// A controller wired to the scripted collaborators.
pub struct Harness {
    pub runner: Arc<ScriptedRunner>,
    pub renderer: Arc<RecordingRenderer>,
    pub directories: Arc<RunDirectoryManager>,
    pub controller: SwrController,
}

impl Harness {
    pub fn new(root: &Path, exp_id: &str, runner: ScriptedRunner) -> Self {
        let extractor: Arc<dyn TrajectoryExtractor> = Arc::new(JsonTrajectoryExtractor::default());
        Self::with_parts(root, exp_id, runner, RecordingRenderer::default(), extractor)
    }

    pub fn with_parts(
        root: &Path,
        exp_id: &str,
        runner: ScriptedRunner,
        renderer: RecordingRenderer,
        extractor: Arc<dyn TrajectoryExtractor>,
    ) -> Self {
        let runner = Arc::new(runner);
        let renderer = Arc::new(renderer);
        let directories = Arc::new(RunDirectoryManager::new(root));
        let controller = SwrController::new(
            experiment(exp_id),
            Arc::clone(&runner) as Arc<dyn ModelRunner>,
            extractor,
            Arc::clone(&renderer) as Arc<dyn ConfigRenderer>,
            Arc::clone(&directories),
        );
        runner.set_cancel_handle(controller.cancel_handle());
        Self {
            runner,
            renderer,
            directories,
            controller,
        }
    }
}

/// Names of the entries of `dir`, sorted.
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
