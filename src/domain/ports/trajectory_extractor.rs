//! Trajectory extractor port.

use async_trait::async_trait;

use super::model_runner::RunArtifacts;
use crate::domain::models::Trajectory;

/// Reads the interface time series out of a finished run.
///
/// Implementations are responsible for putting the samples on the model's
/// coupling time grid; the convergence monitor does not interpolate.
#[async_trait]
pub trait TrajectoryExtractor: Send + Sync {
    async fn extract(&self, artifacts: &RunArtifacts) -> anyhow::Result<Trajectory>;
}
