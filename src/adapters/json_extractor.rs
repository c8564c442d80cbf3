//! Reads interface trajectories written by the model as JSON.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::domain::models::Trajectory;
use crate::domain::ports::{RunArtifacts, TrajectoryExtractor};

pub const DEFAULT_TRAJECTORY_FILE: &str = "interface_trajectory.json";

/// Expects a file of the form
///
/// ```json
/// {
///   "times": ["2014-07-02T06:00:00", "2014-07-02T07:00:00"],
///   "quantities": { "sst": [271.3, 271.4], "heat_flux": [-40.2, -38.9] }
/// }
/// ```
///
/// sampled at the coupling interval.
#[derive(Debug, Clone)]
pub struct JsonTrajectoryExtractor {
    file_name: String,
}

impl JsonTrajectoryExtractor {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Default for JsonTrajectoryExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TRAJECTORY_FILE)
    }
}

#[async_trait]
impl TrajectoryExtractor for JsonTrajectoryExtractor {
    async fn extract(&self, artifacts: &RunArtifacts) -> Result<Trajectory> {
        let path = artifacts.directory.join(&self.file_name);
        let body = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let trajectory: Trajectory = serde_json::from_str(&body)
            .with_context(|| format!("Malformed trajectory in {}", path.display()))?;
        trajectory.validate()?;
        Ok(trajectory)
    }
}
