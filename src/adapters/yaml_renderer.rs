//! Renders run snapshots as YAML for the model's launch script.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::domain::models::RunSnapshot;
use crate::domain::ports::ConfigRenderer;

/// Name of the rendered configuration inside a run directory.
pub const RUN_CONFIG_FILE_NAME: &str = "swr_run.yaml";

/// Writes the whole [`RunSnapshot`] as `swr_run.yaml`.
///
/// Launch scripts translate it into the namelists and XML the sub-models
/// expect.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlConfigRenderer;

impl YamlConfigRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfigRenderer for YamlConfigRenderer {
    async fn render(&self, snapshot: &RunSnapshot) -> Result<()> {
        let path = snapshot.run_directory.join(RUN_CONFIG_FILE_NAME);
        let yaml = serde_yaml::to_string(snapshot).context("Failed to serialize run snapshot")?;
        tokio::fs::write(&path, yaml)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), "Run configuration rendered");
        Ok(())
    }
}
