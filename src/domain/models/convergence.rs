//! Convergence bookkeeping for Schwarz waveform relaxation runs.
//!
//! [`ConvergenceRecord`] is the structured artifact downstream analysis reads
//! back to classify experiments; [`SwrOutcome`] is what the controller hands
//! to its caller once the loop terminates.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::ValidationError;

/// Distance measures between consecutive interface trajectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NormKind {
    #[serde(rename = "2-norm")]
    Euclidean,
    #[serde(rename = "inf-norm")]
    Maximum,
}

impl NormKind {
    /// Every norm that must pass for an iterate to count as converged.
    pub const ALL: [Self; 2] = [Self::Euclidean, Self::Maximum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Euclidean => "2-norm",
            Self::Maximum => "inf-norm",
        }
    }
}

impl fmt::Display for NormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative distance per norm for one pair of iterates.
pub type NormValues = BTreeMap<NormKind, f64>;

/// Latest value of one norm and whether it met the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormStatus {
    pub value: f64,
    pub passed: bool,
}

/// Convergence state of an SWR run, updated once per iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceRecord {
    /// Last iteration executed (0 before the first one finishes).
    pub iteration: u32,
    pub converged: bool,
    pub rel_tol: f64,
    #[serde(default)]
    pub norms: BTreeMap<NormKind, NormStatus>,
}

impl ConvergenceRecord {
    pub fn new(rel_tol: f64) -> Self {
        Self {
            iteration: 0,
            converged: false,
            rel_tol,
            norms: BTreeMap::new(),
        }
    }

    /// Record iteration `iteration`. `values` is `None` for the first iterate,
    /// which has nothing to be compared against.
    pub fn update(&mut self, iteration: u32, values: Option<&NormValues>, converged: bool) {
        self.iteration = iteration;
        self.converged = converged;
        if let Some(values) = values {
            self.norms = values
                .iter()
                .map(|(kind, value)| {
                    (
                        *kind,
                        NormStatus {
                            value: *value,
                            passed: value.is_finite() && *value <= self.rel_tol,
                        },
                    )
                })
                .collect();
        }
    }

    /// Whether `kind` passed at the latest measurement.
    pub fn passed(&self, kind: NormKind) -> bool {
        self.norms.get(&kind).is_some_and(|status| status.passed)
    }

    /// Every norm passed at the latest measurement.
    pub fn all_passed(&self) -> bool {
        NormKind::ALL.iter().all(|kind| self.passed(*kind))
    }
}

/// Parameters of one call to the SWR controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwrParams {
    pub max_iters: u32,
    pub rel_tol: f64,
    /// Stop at the first converged iterate. `false` runs the whole budget.
    pub stop_at_convergence: bool,
}

impl SwrParams {
    pub fn new(max_iters: u32, rel_tol: f64) -> Self {
        Self {
            max_iters,
            rel_tol,
            stop_at_convergence: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_iters == 0 {
            return Err(ValidationError::InvalidIterationBudget(self.max_iters));
        }
        if !self.rel_tol.is_finite() || self.rel_tol <= 0.0 {
            return Err(ValidationError::InvalidTolerance(self.rel_tol));
        }
        Ok(())
    }
}

impl Default for SwrParams {
    fn default() -> Self {
        Self::new(30, 1e-5)
    }
}

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SwrState {
    Init,
    Running { iteration: u32 },
    Converged,
    Exhausted,
    Cancelled,
}

impl SwrState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged | Self::Exhausted | Self::Cancelled)
    }
}

/// How an SWR run ended. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Converged,
    Exhausted,
    Cancelled,
}

impl TerminalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TerminalState> for SwrState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Converged => Self::Converged,
            TerminalState::Exhausted => Self::Exhausted,
            TerminalState::Cancelled => Self::Cancelled,
        }
    }
}

/// Summary of one executed iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub directory: PathBuf,
    /// `None` for the first iterate.
    pub norms: Option<NormValues>,
    pub converged: bool,
    pub finished_at: DateTime<Utc>,
}

/// Frozen result of an SWR run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwrOutcome {
    pub run_id: Uuid,
    pub exp_id: String,
    pub state: TerminalState,
    pub record: ConvergenceRecord,
    pub iterations: Vec<IterationRecord>,
}

impl SwrOutcome {
    pub fn converged(&self) -> bool {
        self.state == TerminalState::Converged
    }

    pub fn final_iteration(&self) -> u32 {
        self.record.iteration
    }

    /// Archived directory of the last executed iteration.
    pub fn final_directory(&self) -> Option<&PathBuf> {
        self.iterations.last().map(|it| &it.directory)
    }
}
