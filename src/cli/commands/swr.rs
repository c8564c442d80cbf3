//! `swr` command: run the SWR loop for one experiment.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;

use super::{cancel_on_ctrl_c, load_experiment, output_reducer};
use crate::adapters::{JsonTrajectoryExtractor, ProcessModelRunner, YamlConfigRenderer};
use crate::cli::output::{format_norm, output, CommandOutput};
use crate::cli::table::list_table;
use crate::domain::models::{Config, NormKind, RetentionPolicy, SwrOutcome, SwrParams};
use crate::services::{apply_retention, RunDirectoryManager, SwrController};

#[derive(Args, Debug)]
pub struct SwrArgs {
    /// Experiment definition (YAML)
    pub experiment: PathBuf,

    /// Iteration budget (overrides config)
    #[arg(long)]
    pub max_iters: Option<u32>,

    /// Relative tolerance on both norms (overrides config)
    #[arg(long)]
    pub rel_tol: Option<f64>,

    /// Run the whole budget even after convergence
    #[arg(long)]
    pub no_stop_at_convergence: bool,

    /// Which iterates to keep afterwards (overrides config)
    #[arg(long, value_enum)]
    pub retention: Option<RetentionArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetentionArg {
    KeepAll,
    KeepFinal,
    KeepFirstAndFinal,
}

impl From<RetentionArg> for RetentionPolicy {
    fn from(arg: RetentionArg) -> Self {
        match arg {
            RetentionArg::KeepAll => Self::KeepAll,
            RetentionArg::KeepFinal => Self::KeepFinal,
            RetentionArg::KeepFirstAndFinal => Self::KeepFirstAndFinal,
        }
    }
}

impl SwrArgs {
    /// Merge command line overrides into the configured defaults.
    pub fn params(&self, config: &Config) -> SwrParams {
        SwrParams {
            max_iters: self.max_iters.unwrap_or(config.swr.max_iters),
            rel_tol: self.rel_tol.unwrap_or(config.swr.rel_tol),
            stop_at_convergence: config.swr.stop_at_convergence && !self.no_stop_at_convergence,
        }
    }

    pub fn retention(&self, config: &Config) -> RetentionPolicy {
        self.retention.map_or(config.retention, Into::into)
    }
}

#[derive(Debug, Serialize)]
pub struct SwrRunOutput {
    #[serde(flatten)]
    pub outcome: SwrOutcome,
    pub discarded: Vec<PathBuf>,
}

impl CommandOutput for SwrRunOutput {
    fn to_human(&self) -> String {
        let outcome = &self.outcome;
        let mut table = list_table(&["iter", "2-norm", "inf-norm", "converged", "directory"]);
        for it in &outcome.iterations {
            let norm = |kind: NormKind| it.norms.as_ref().and_then(|n| n.get(&kind)).copied();
            table.add_row(vec![
                it.iteration.to_string(),
                format_norm(norm(NormKind::Euclidean)),
                format_norm(norm(NormKind::Maximum)),
                if it.converged { "yes" } else { "no" }.to_string(),
                it.directory.display().to_string(),
            ]);
        }

        let mut lines = vec![
            format!(
                "Experiment {} {} after {} iteration(s) (rel_tol {:e})",
                outcome.exp_id,
                outcome.state,
                outcome.final_iteration(),
                outcome.record.rel_tol
            ),
            String::new(),
            table.to_string(),
        ];
        if !self.discarded.is_empty() {
            lines.push(format!("\nDiscarded {} iterate(s) per retention policy", self.discarded.len()));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: SwrArgs, config: &Config, json_mode: bool) -> Result<()> {
    let experiment = load_experiment(&args.experiment).await?;
    let params = args.params(config);

    let directories = Arc::new(RunDirectoryManager::new(&config.output_root));
    let controller = SwrController::new(
        experiment,
        Arc::new(ProcessModelRunner::new(config.runner.clone())),
        Arc::new(JsonTrajectoryExtractor::default()),
        Arc::new(YamlConfigRenderer::new()),
        Arc::clone(&directories),
    )
    .with_output_reduction(output_reducer(config)?);
    cancel_on_ctrl_c(controller.cancel_handle());

    let outcome = controller.run(params).await?;
    let discarded = apply_retention(&directories, &outcome, args.retention(config)).await?;

    output(&SwrRunOutput { outcome, discarded }, json_mode);
    Ok(())
}
