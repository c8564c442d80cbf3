//! Registry keys for archived runs.
//!
//! Archived directories are addressed by `(exp_id, label)` instead of by
//! parsing suffixes out of path strings.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::experiment::CouplingScheme;

/// What a single model run inside an experiment represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RunLabel {
    /// One SWR iteration (1-based).
    Iteration(u32),
    /// One naive coupled run under a fixed topology.
    Topology(CouplingScheme),
    /// Partial output of an SWR iteration whose model run failed.
    FailedIteration(u32),
}

impl RunLabel {
    /// Directory name used for this label below the experiment's archive root.
    pub fn dir_name(&self) -> String {
        match self {
            Self::Iteration(n) => format!("iter_{n}"),
            Self::Topology(scheme) => scheme.as_str().to_string(),
            Self::FailedIteration(n) => format!("failed_iter_{n}"),
        }
    }

    pub fn iteration(&self) -> Option<u32> {
        match self {
            Self::Iteration(n) | Self::FailedIteration(n) => Some(*n),
            Self::Topology(_) => None,
        }
    }
}

impl fmt::Display for RunLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// First-class `(exp_id, label)` key of an archived run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub exp_id: String,
    pub label: RunLabel,
}

impl RunKey {
    pub fn new(exp_id: impl Into<String>, label: RunLabel) -> Self {
        Self {
            exp_id: exp_id.into(),
            label,
        }
    }

    pub fn iteration(exp_id: impl Into<String>, iteration: u32) -> Self {
        Self::new(exp_id, RunLabel::Iteration(iteration))
    }

    pub fn topology(exp_id: impl Into<String>, scheme: CouplingScheme) -> Self {
        Self::new(exp_id, RunLabel::Topology(scheme))
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.exp_id, self.label)
    }
}
