//! `summary` command: converged / non-converged counts over an ensemble.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{format_norm, output, CommandOutput};
use crate::cli::table::list_table;
use crate::domain::models::Config;
use crate::services::{summarize, EnsembleSummary, ExperimentStatus};

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Output root to scan (defaults to the configured output root)
    pub root: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct SummaryOutput {
    #[serde(flatten)]
    pub summary: EnsembleSummary,
}

impl CommandOutput for SummaryOutput {
    fn to_human(&self) -> String {
        let summary = &self.summary;
        if summary.experiments.is_empty() {
            return "No SWR experiments found.".to_string();
        }

        let mut table = list_table(&["experiment", "start", "status", "iters", "2-norm", "inf-norm"]);
        for exp in &summary.experiments {
            let status = match exp.status {
                ExperimentStatus::Converged => "converged",
                ExperimentStatus::NotConverged => "not converged",
                ExperimentStatus::Incomplete => "incomplete",
            };
            table.add_row(vec![
                exp.exp_id.clone(),
                exp.run_start_date.format("%Y-%m-%d %H:%M").to_string(),
                status.to_string(),
                exp.iterations.to_string(),
                format_norm(exp.two_norm),
                format_norm(exp.inf_norm),
            ]);
        }

        let mut lines = vec![
            table.to_string(),
            String::new(),
            format!(
                "{} converged, {} not converged, {} incomplete",
                summary.converged, summary.not_converged, summary.incomplete
            ),
        ];
        if let Some(stats) = summary.iteration_stats {
            lines.push(format!(
                "Iterations to converge: mean {:.2}, median {:.1}, max {}",
                stats.mean, stats.median, stats.max
            ));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: SummaryArgs, config: &Config, json_mode: bool) -> Result<()> {
    let root = args.root.unwrap_or_else(|| config.output_root.clone());
    let summary = summarize(&root).await?;
    output(&SummaryOutput { summary }, json_mode);
    Ok(())
}
