//! Interface trajectories.
//!
//! A trajectory is the time series of quantities exchanged across the
//! atmosphere-ocean interface (fluxes, SST, ...) over one simulation window,
//! as read back from a finished run.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{CouplingError, CouplingResult};

/// Named interface quantities sampled on a shared time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Trajectory {
    pub times: Vec<NaiveDateTime>,
    pub quantities: BTreeMap<String, Vec<f64>>,
}

impl Trajectory {
    pub fn new(times: Vec<NaiveDateTime>) -> Self {
        Self {
            times,
            quantities: BTreeMap::new(),
        }
    }

    /// Builder-style insertion of one quantity series.
    pub fn with_quantity(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.quantities.insert(name.into(), values);
        self
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Check the trajectory is internally consistent: strictly increasing
    /// times and one value per time for every quantity.
    pub fn validate(&self) -> CouplingResult<()> {
        if self.times.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(CouplingError::TrajectoryMismatch(
                "time grid is not strictly increasing".to_string(),
            ));
        }
        for (name, values) in &self.quantities {
            if values.len() != self.times.len() {
                return Err(CouplingError::TrajectoryMismatch(format!(
                    "quantity '{name}' has {} samples for {} times",
                    values.len(),
                    self.times.len()
                )));
            }
        }
        Ok(())
    }
}
