//! `naive` command: one run per coupling scheme.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::{cancel_on_ctrl_c, load_experiment, output_reducer};
use crate::adapters::{ProcessModelRunner, YamlConfigRenderer};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::{NaiveCouplingDriver, NaiveOutcome, RunDirectoryManager};

#[derive(Args, Debug)]
pub struct NaiveArgs {
    /// Experiment definition (YAML)
    pub experiment: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct NaiveRunOutput {
    #[serde(flatten)]
    pub outcome: NaiveOutcome,
}

impl CommandOutput for NaiveRunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Experiment {}:", self.outcome.exp_id)];
        for run in &self.outcome.runs {
            lines.push(format!("  {:<10} {}", run.scheme, run.directory.display()));
        }
        if self.outcome.cancelled {
            lines.push("Cancelled before all coupling schemes ran".to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: NaiveArgs, config: &Config, json_mode: bool) -> Result<()> {
    let experiment = load_experiment(&args.experiment).await?;
    let driver = NaiveCouplingDriver::new(
        experiment,
        Arc::new(ProcessModelRunner::new(config.runner.clone())),
        Arc::new(YamlConfigRenderer::new()),
        Arc::new(RunDirectoryManager::new(&config.output_root)),
    )
    .with_output_reduction(output_reducer(config)?);
    cancel_on_ctrl_c(driver.cancel_handle());

    let outcome = driver.run().await?;
    output(&NaiveRunOutput { outcome }, json_mode);
    Ok(())
}
