//! CLI command implementations.

pub mod naive;
pub mod offset;
pub mod summary;
pub mod swr;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::adapters::json_extractor::DEFAULT_TRAJECTORY_FILE;
use crate::adapters::yaml_renderer::RUN_CONFIG_FILE_NAME;
use crate::domain::models::{Config, ExperimentConfig, ExperimentDefinition};
use crate::domain::ports::CancelHandle;
use crate::services::OutputReducer;

/// Read and validate an experiment YAML file.
pub async fn load_experiment(path: &Path) -> Result<Arc<ExperimentConfig>> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read experiment file {}", path.display()))?;
    let definition = ExperimentDefinition::from_yaml(&yaml)
        .with_context(|| format!("Failed to parse experiment file {}", path.display()))?;
    let config = ExperimentConfig::from_definition(definition)
        .with_context(|| format!("Invalid experiment in {}", path.display()))?;
    Ok(Arc::new(config))
}

/// Debug output pruning from config. The rendered run configuration and the
/// interface trajectory are always kept.
pub fn output_reducer(config: &Config) -> Result<OutputReducer> {
    Ok(OutputReducer::new(&config.output)?
        .protecting(RUN_CONFIG_FILE_NAME)
        .protecting(DEFAULT_TRAJECTORY_FILE))
}

/// Cancel `handle` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(handle: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing after the current run");
            handle.cancel();
        }
    });
}
