//! Integration tests for the naive (non-iterative) coupling driver

mod common;

use std::sync::Arc;

use common::{dir_names, experiment, temp_dir, CallAction, RecordingRenderer, ScriptedRunner, DEBUG_TRACE};
use swr_coupler::domain::models::{CouplingScheme, RunLabel};
use swr_coupler::domain::ports::{ConfigRenderer, ModelRunner};
use swr_coupler::services::{read_record, NaiveCouplingDriver, OutputReducer, RunDirectoryManager};
use swr_coupler::CouplingError;

struct NaiveHarness {
    runner: Arc<ScriptedRunner>,
    renderer: Arc<RecordingRenderer>,
    directories: Arc<RunDirectoryManager>,
    driver: NaiveCouplingDriver,
}

fn harness(root: &std::path::Path, runner: ScriptedRunner) -> NaiveHarness {
    let runner = Arc::new(runner);
    let renderer = Arc::new(RecordingRenderer::default());
    let directories = Arc::new(RunDirectoryManager::new(root));
    let driver = NaiveCouplingDriver::new(
        experiment("PAPA"),
        Arc::clone(&runner) as Arc<dyn ModelRunner>,
        Arc::clone(&renderer) as Arc<dyn ConfigRenderer>,
        Arc::clone(&directories),
    );
    runner.set_cancel_handle(driver.cancel_handle());
    NaiveHarness {
        runner,
        renderer,
        directories,
        driver,
    }
}

#[tokio::test]
async fn test_runs_each_topology_once_in_order() {
    common::setup_test_logging();
    let tmp = temp_dir();
    let h = harness(tmp.path(), ScriptedRunner::converging());

    let outcome = h.driver.run().await.unwrap();

    assert!(!outcome.cancelled);
    let schemes: Vec<CouplingScheme> = outcome.runs.iter().map(|run| run.scheme).collect();
    assert_eq!(schemes, CouplingScheme::ALL.to_vec());
    assert_eq!(
        dir_names(&tmp.path().join("PAPA")),
        vec!["atm-first", "oce-first", "parallel"]
    );

    let calls = h.runner.calls();
    assert_eq!(calls.len(), 3);
    for (snapshot, scheme) in calls.iter().zip(CouplingScheme::ALL) {
        assert_eq!(snapshot.cpl_scheme, scheme);
        assert_eq!(snapshot.label, RunLabel::Topology(scheme));
        assert_eq!(snapshot.run_id, outcome.run_id);
        assert_eq!(snapshot.boundary, snapshot.experiment.initial_boundary());
    }
    assert_eq!(h.renderer.rendered().len(), 3);
}

#[tokio::test]
async fn test_archived_topologies_carry_records_without_convergence() {
    let tmp = temp_dir();
    let h = harness(tmp.path(), ScriptedRunner::converging());

    let outcome = h.driver.run().await.unwrap();

    for run in &outcome.runs {
        let record = read_record(&run.directory).await.unwrap();
        assert_eq!(record.snapshot.cpl_scheme, run.scheme);
        assert_eq!(record.snapshot.run_directory, run.directory);
        assert!(record.convergence.is_none());
        assert!(record.terminal.is_none());
        assert!(run.directory.join("ocean_output.nc").exists());
        assert!(!run.directory.join(DEBUG_TRACE).exists());
    }
    assert_eq!(h.directories.archived_for("PAPA").await.len(), 3);
}

#[tokio::test]
async fn test_keep_debug_output_leaves_traces_in_archive() {
    let tmp = temp_dir();
    let mut h = harness(tmp.path(), ScriptedRunner::converging());
    h.driver = h.driver.with_output_reduction(OutputReducer::keep_all());

    let outcome = h.driver.run().await.unwrap();

    assert!(outcome
        .runs
        .iter()
        .all(|run| run.directory.join(DEBUG_TRACE).exists()));
}

#[tokio::test]
async fn test_failure_stops_remaining_topologies() {
    let tmp = temp_dir();
    let h = harness(
        tmp.path(),
        ScriptedRunner::converging().with_action(2, CallAction::Fail),
    );

    let err = h.driver.run().await.unwrap_err();

    assert!(matches!(
        err,
        CouplingError::ModelRunFailure {
            run: RunLabel::Topology(CouplingScheme::AtmosphereFirst),
            ..
        }
    ));
    assert_eq!(h.runner.call_count(), 2);
    assert_eq!(dir_names(&tmp.path().join("PAPA")), vec!["parallel"]);
    assert!(h.directories.live("PAPA").await.is_none());
}

#[tokio::test]
async fn test_cancellation_reports_completed_topologies() {
    let tmp = temp_dir();
    let h = harness(
        tmp.path(),
        ScriptedRunner::converging().with_action(2, CallAction::CancelAndAbort),
    );

    let outcome = h.driver.run().await.unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.runs.len(), 1);
    assert_eq!(outcome.runs[0].scheme, CouplingScheme::Parallel);
    assert_eq!(dir_names(&tmp.path().join("PAPA")), vec!["parallel"]);
}

#[tokio::test]
async fn test_existing_archive_is_a_conflict() {
    let tmp = temp_dir();
    harness(tmp.path(), ScriptedRunner::converging())
        .driver
        .run()
        .await
        .unwrap();

    let again = harness(tmp.path(), ScriptedRunner::converging());
    let err = again.driver.run().await.unwrap_err();

    assert!(matches!(err, CouplingError::DirectoryConflict { .. }));
    assert_eq!(again.runner.call_count(), 0);
}
