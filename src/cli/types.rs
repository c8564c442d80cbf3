//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::{naive::NaiveArgs, offset::OffsetArgs, summary::SummaryArgs, swr::SwrArgs};

#[derive(Parser, Debug)]
#[command(name = "swr-coupler")]
#[command(about = "Schwarz waveform relaxation driver for coupled atmosphere-ocean runs", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to swr-coupler.yaml + swr-coupler.local.yaml)
    #[arg(short, long, global = true, env = "SWR_CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Iterate an experiment with SWR until convergence
    Swr(SwrArgs),

    /// Run an experiment once per coupling scheme
    Naive(NaiveArgs),

    /// Compute the forcing offset (nstrtini) of a start date
    Offset(OffsetArgs),

    /// Classify finished SWR experiments below an output root
    Summary(SummaryArgs),
}
