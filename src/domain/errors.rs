//! Domain errors for the SWR coupling controller.

use std::path::PathBuf;

use chrono::{NaiveDateTime, TimeDelta};
use thiserror::Error;

use super::models::RunLabel;

/// Failure to place a calendar timestamp on a forcing series' time axis.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("Target {target} precedes forcing series start {forcing_start}")]
    BeforeForcingStart {
        target: NaiveDateTime,
        forcing_start: NaiveDateTime,
    },

    #[error(
        "Target {target} is not aligned with forcing series starting {forcing_start} \
         at {frequency_hours}h frequency ({remainder} past the last step)"
    )]
    Misaligned {
        target: NaiveDateTime,
        forcing_start: NaiveDateTime,
        frequency_hours: u32,
        remainder: TimeDelta,
    },

    #[error("Forcing frequency must be at least one hour")]
    ZeroFrequency,
}

/// Experiment configuration rejected at load time or at controller INIT.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Experiment id cannot be empty")]
    EmptyExperimentId,

    #[error("Invalid experiment id '{0}': only letters, digits, '_', '-' and '.' are allowed and it may not start with '.'")]
    InvalidExperimentId(String),

    #[error("Time step of {component} must be positive")]
    NonPositiveTimestep { component: &'static str },

    #[error("Simulation window is empty: end {end} is not after start {start}")]
    EmptyWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Simulation window of {window} is not a multiple of the {component} step ({step_seconds}s)")]
    WindowNotMultiple {
        component: &'static str,
        window: TimeDelta,
        step_seconds: u32,
    },

    #[error("{component} step ({step_seconds}s) does not divide the coupling interval ({dt_cpl}s)")]
    IncommensurateTimestep {
        component: &'static str,
        step_seconds: u32,
        dt_cpl: u32,
    },

    #[error("Sea ice is enabled but no ice restart file was given")]
    MissingIceRestart,

    #[error("Invalid iteration budget: {0}. Must be at least 1")]
    InvalidIterationBudget(u32),

    #[error("Invalid relative tolerance: {0}. Must be finite and positive")]
    InvalidTolerance(f64),

    #[error("Invalid debug output pattern '{pattern}': {reason}")]
    InvalidDebugPattern { pattern: String, reason: String },
}

/// Errors surfaced by the coupling services. None of them are retried.
#[derive(Debug, Error)]
pub enum CouplingError {
    #[error("Time alignment failed: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Invalid experiment configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Run directory conflict for experiment '{exp_id}': {} is still claimed or populated", path.display())]
    DirectoryConflict { exp_id: String, path: PathBuf },

    #[error("Run directory not found: {}", .0.display())]
    MissingRunDirectory(PathBuf),

    #[error("Interface trajectories cannot be compared: {0}")]
    TrajectoryMismatch(String),

    #[error("Model run {run} failed: {source:#}")]
    ModelRunFailure {
        run: RunLabel,
        #[source]
        source: anyhow::Error,
    },

    #[error("Could not extract interface trajectory from run {run}: {source:#}")]
    ExtractionFailed {
        run: RunLabel,
        #[source]
        source: anyhow::Error,
    },

    #[error("Could not render model configuration for run {run}: {source:#}")]
    RenderFailed {
        run: RunLabel,
        #[source]
        source: anyhow::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CouplingError {
    /// Wrap an I/O error with a human readable description of the operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// The run a collaborator failure belongs to, if any.
    pub fn run(&self) -> Option<&RunLabel> {
        match self {
            Self::ModelRunFailure { run, .. }
            | Self::ExtractionFailed { run, .. }
            | Self::RenderFailed { run, .. } => Some(run),
            _ => None,
        }
    }
}

pub type CouplingResult<T> = Result<T, CouplingError>;

impl From<serde_yaml::Error> for CouplingError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CouplingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
