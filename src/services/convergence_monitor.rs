//! Convergence Monitor
//!
//! Measures how far an SWR iterate moved from its predecessor. Both
//! trajectories must already share one time grid; nothing is interpolated
//! here, a mismatch is reported as an error.

use tracing::debug;

use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{NormKind, NormValues, Trajectory};

/// Relative distances between consecutive interface trajectories.
///
/// For every quantity with `d = curr - prev`:
/// - 2-norm: `||d||_2 / ||curr||_2`
/// - inf-norm: `max|d| / max|curr|`
///
/// falling back to the absolute distance when the reference magnitude is
/// zero. Each norm's experiment-level value is the worst quantity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergenceMonitor;

impl ConvergenceMonitor {
    pub fn new() -> Self {
        Self
    }

    pub fn measure(&self, prev: &Trajectory, curr: &Trajectory) -> CouplingResult<NormValues> {
        check_comparable(prev, curr)?;

        let mut euclidean = 0.0_f64;
        let mut maximum = 0.0_f64;
        for (name, curr_values) in &curr.quantities {
            let Some(prev_values) = prev.quantities.get(name) else {
                return Err(CouplingError::TrajectoryMismatch(format!(
                    "quantity '{name}' missing from previous iterate"
                )));
            };

            let mut diff_sq = 0.0_f64;
            let mut ref_sq = 0.0_f64;
            let mut diff_max = 0.0_f64;
            let mut ref_max = 0.0_f64;
            for (c, p) in curr_values.iter().zip(prev_values) {
                let d = (c - p).abs();
                diff_sq += d * d;
                ref_sq += c * c;
                diff_max = worst(diff_max, d);
                ref_max = worst(ref_max, c.abs());
            }

            let two = relative(diff_sq.sqrt(), ref_sq.sqrt());
            let inf = relative(diff_max, ref_max);
            debug!(quantity = %name, two_norm = two, inf_norm = inf, "Quantity distance");
            euclidean = worst(euclidean, two);
            maximum = worst(maximum, inf);
        }

        Ok(NormValues::from([
            (NormKind::Euclidean, euclidean),
            (NormKind::Maximum, maximum),
        ]))
    }

    /// True only when every norm is present, finite and at most `rel_tol`.
    pub fn has_converged(&self, values: &NormValues, rel_tol: f64) -> bool {
        NormKind::ALL.iter().all(|kind| {
            values
                .get(kind)
                .is_some_and(|value| value.is_finite() && *value <= rel_tol)
        })
    }
}

fn check_comparable(prev: &Trajectory, curr: &Trajectory) -> CouplingResult<()> {
    prev.validate()?;
    curr.validate()?;

    if curr.is_empty() {
        return Err(CouplingError::TrajectoryMismatch(
            "interface trajectory has no samples".to_string(),
        ));
    }
    if curr.quantities.is_empty() {
        return Err(CouplingError::TrajectoryMismatch(
            "interface trajectory has no quantities".to_string(),
        ));
    }
    if prev.times != curr.times {
        let detail = match prev.times.iter().zip(&curr.times).position(|(a, b)| a != b) {
            Some(idx) => format!(
                "sample {idx} is at {} in the previous iterate but {} in the current one",
                prev.times[idx], curr.times[idx]
            ),
            None => format!(
                "previous iterate has {} samples, current has {}",
                prev.len(),
                curr.len()
            ),
        };
        return Err(CouplingError::TrajectoryMismatch(format!(
            "time grids differ: {detail}"
        )));
    }
    if !prev.quantities.keys().eq(curr.quantities.keys()) {
        let prev_names: Vec<_> = prev.quantities.keys().collect();
        let curr_names: Vec<_> = curr.quantities.keys().collect();
        return Err(CouplingError::TrajectoryMismatch(format!(
            "quantity sets differ: {prev_names:?} vs {curr_names:?}"
        )));
    }
    Ok(())
}

fn relative(distance: f64, reference: f64) -> f64 {
    if reference > 0.0 {
        distance / reference
    } else {
        distance
    }
}

/// Like `f64::max`, but NaN wins so a corrupt sample can never pass.
fn worst(acc: f64, value: f64) -> f64 {
    if value.is_nan() || value > acc {
        value
    } else {
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    fn grid(n: u32) -> Vec<NaiveDateTime> {
        (0..n)
            .map(|h| {
                NaiveDate::from_ymd_opt(2014, 7, 2)
                    .unwrap()
                    .and_hms_opt(h, 0, 0)
                    .unwrap()
            })
            .collect()
    }

    fn values(two: f64, inf: f64) -> NormValues {
        NormValues::from([(NormKind::Euclidean, two), (NormKind::Maximum, inf)])
    }

    #[test]
    fn test_identical_trajectories_have_zero_distance() {
        let traj = Trajectory::new(grid(3)).with_quantity("sst", vec![271.0, 272.0, 273.0]);
        let norms = ConvergenceMonitor::new().measure(&traj, &traj).unwrap();
        assert_eq!(norms[&NormKind::Euclidean], 0.0);
        assert_eq!(norms[&NormKind::Maximum], 0.0);
    }

    #[test]
    fn test_norms_are_relative_and_take_worst_quantity() {
        let prev = Trajectory::new(grid(2))
            .with_quantity("heat_flux", vec![100.0, 100.0])
            .with_quantity("sst", vec![3.0, 4.0]);
        let curr = Trajectory::new(grid(2))
            .with_quantity("heat_flux", vec![100.0, 101.0])
            .with_quantity("sst", vec![3.0, 4.0]);
        let norms = ConvergenceMonitor::new().measure(&prev, &curr).unwrap();

        let expected_two = 1.0 / (100.0_f64.powi(2) + 101.0_f64.powi(2)).sqrt();
        assert!((norms[&NormKind::Euclidean] - expected_two).abs() < 1e-12);
        assert!((norms[&NormKind::Maximum] - 1.0 / 101.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_reference_uses_absolute_distance() {
        let prev = Trajectory::new(grid(2)).with_quantity("tau", vec![0.5, 0.0]);
        let curr = Trajectory::new(grid(2)).with_quantity("tau", vec![0.0, 0.0]);
        let norms = ConvergenceMonitor::new().measure(&prev, &curr).unwrap();
        assert_eq!(norms[&NormKind::Euclidean], 0.5);
        assert_eq!(norms[&NormKind::Maximum], 0.5);
    }

    #[test]
    fn test_mismatched_grids_are_fatal() {
        let monitor = ConvergenceMonitor::new();
        let prev = Trajectory::new(grid(3)).with_quantity("sst", vec![1.0; 3]);
        let shorter = Trajectory::new(grid(2)).with_quantity("sst", vec![1.0; 2]);
        assert!(matches!(
            monitor.measure(&prev, &shorter),
            Err(CouplingError::TrajectoryMismatch(_))
        ));

        let mut shifted_times = grid(4);
        shifted_times.remove(0);
        let shifted = Trajectory::new(shifted_times).with_quantity("sst", vec![1.0; 3]);
        let err = monitor.measure(&prev, &shifted).unwrap_err();
        assert!(err.to_string().contains("sample 0"));

        let renamed = Trajectory::new(grid(3)).with_quantity("t2m", vec![1.0; 3]);
        assert!(monitor.measure(&prev, &renamed).is_err());

        let empty = Trajectory::default();
        assert!(monitor.measure(&empty, &empty).is_err());
    }

    #[test]
    fn test_nan_sample_blocks_convergence() {
        let monitor = ConvergenceMonitor::new();
        let prev = Trajectory::new(grid(2)).with_quantity("sst", vec![1.0, 1.0]);
        let curr = Trajectory::new(grid(2)).with_quantity("sst", vec![1.0, f64::NAN]);
        let norms = monitor.measure(&prev, &curr).unwrap();
        assert!(!monitor.has_converged(&norms, 1.0));
    }

    #[test]
    fn test_has_converged_is_conjunctive() {
        let monitor = ConvergenceMonitor::new();
        assert!(monitor.has_converged(&values(0.0009, 0.0008), 1e-3));
        assert!(monitor.has_converged(&values(1e-3, 1e-3), 1e-3));
        assert!(!monitor.has_converged(&values(0.0009, 0.002), 1e-3));
        assert!(!monitor.has_converged(&values(0.01, 0.0008), 1e-3));

        let mut missing = values(0.0, 0.0);
        missing.remove(&NormKind::Maximum);
        assert!(!monitor.has_converged(&missing, 1e-3));
    }

    proptest! {
        /// Property: one norm above tolerance is enough to block convergence.
        #[test]
        fn prop_single_violation_blocks_convergence(
            tol in 1e-8f64..1.0,
            passing in 0.0f64..1.0,
            excess in 1e-6f64..10.0,
            violating_first in any::<bool>(),
        ) {
            let ok = passing * tol;
            let bad = tol * (1.0 + excess);
            let norms = if violating_first { values(bad, ok) } else { values(ok, bad) };
            prop_assert!(!ConvergenceMonitor::new().has_converged(&norms, tol));
        }
    }
}
