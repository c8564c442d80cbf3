//! `offset` command: forcing offset of a simulation start.

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::{compute_offset, parse_timestamp};

#[derive(Args, Debug)]
pub struct OffsetArgs {
    /// Simulation start, e.g. 2014-07-01T18:00
    #[arg(long, value_parser = parse_timestamp)]
    pub target: NaiveDateTime,

    /// First timestamp of the forcing series
    #[arg(long, value_parser = parse_timestamp)]
    pub forcing_start: NaiveDateTime,

    /// Forcing frequency in hours
    #[arg(long)]
    pub frequency_hours: u32,
}

#[derive(Debug, Serialize)]
pub struct OffsetOutput {
    pub target: NaiveDateTime,
    pub forcing_start: NaiveDateTime,
    pub frequency_hours: u32,
    pub nstrtini: u64,
}

impl CommandOutput for OffsetOutput {
    fn to_human(&self) -> String {
        self.nstrtini.to_string()
    }
}

pub fn execute(args: OffsetArgs, json_mode: bool) -> Result<()> {
    let nstrtini = compute_offset(args.target, args.forcing_start, args.frequency_hours)?;
    output(
        &OffsetOutput {
            target: args.target,
            forcing_start: args.forcing_start,
            frequency_hours: args.frequency_hours,
            nstrtini,
        },
        json_mode,
    );
    Ok(())
}
