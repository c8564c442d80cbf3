//! Experiment configuration.
//!
//! An [`ExperimentDefinition`] is what a driver script or YAML file provides.
//! [`ExperimentConfig::from_definition`] validates it and resolves the forcing
//! offset, producing the immutable record every model run is derived from.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{CouplingResult, ValidationError};
use crate::domain::time_alignment::compute_offset;

/// Ordering in which the sub-models exchange data within one coupling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum CouplingScheme {
    #[default]
    #[serde(rename = "parallel")]
    Parallel,
    #[serde(rename = "atm-first")]
    AtmosphereFirst,
    #[serde(rename = "oce-first")]
    OceanFirst,
}

impl CouplingScheme {
    /// All topologies, in the order the naive driver runs them.
    pub const ALL: [Self; 3] = [Self::Parallel, Self::AtmosphereFirst, Self::OceanFirst];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::AtmosphereFirst => "atm-first",
            Self::OceanFirst => "oce-first",
        }
    }

    /// Numeric identifier understood by the coupled model.
    pub fn code(&self) -> u8 {
        match self {
            Self::Parallel => 0,
            Self::AtmosphereFirst => 1,
            Self::OceanFirst => 2,
        }
    }
}

impl fmt::Display for CouplingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CouplingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parallel" | "0" => Ok(Self::Parallel),
            "atm-first" | "atmosphere-first" | "1" => Ok(Self::AtmosphereFirst),
            "oce-first" | "ocean-first" | "2" => Ok(Self::OceanFirst),
            other => Err(format!("unknown coupling scheme: {other}")),
        }
    }
}

/// Coupling interval and sub-model step sizes, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timesteps {
    pub dt_cpl: u32,
    pub dt_atmosphere: u32,
    pub dt_ocean: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt_ice: Option<u32>,
}

/// Restart and forcing files handed to the model runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFiles {
    /// Ocean restart state.
    pub ocean_restart: PathBuf,
    /// Sea-ice restart state, required when ice is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_restart: Option<PathBuf>,
    /// Atmospheric forcing series.
    pub atmosphere_forcing: PathBuf,
    /// Initial atmosphere-side coupling field (first iterate / naive runs).
    pub atmosphere_boundary: PathBuf,
    /// Initial ocean-side coupling field (first iterate / naive runs).
    pub ocean_boundary: PathBuf,
}

/// Start and frequency of the atmospheric forcing series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcingSeries {
    pub start: NaiveDateTime,
    pub frequency_hours: u32,
}

/// Physical switches forwarded to the model runner untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsOptions {
    #[serde(default)]
    pub with_ice: bool,
    /// Mass-flux convection scheme toggle.
    #[serde(default = "default_true")]
    pub convection_scheme: bool,
    #[serde(default)]
    pub cloud_water_feedback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atmosphere_levels: Option<u32>,
    /// Fixed dry-ice albedo; model default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_albedo: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, String>,
}

const fn default_true() -> bool {
    true
}

impl Default for PhysicsOptions {
    fn default() -> Self {
        Self {
            with_ice: false,
            convection_scheme: default_true(),
            cloud_water_feedback: false,
            atmosphere_levels: None,
            ice_albedo: None,
            overrides: BTreeMap::new(),
        }
    }
}

/// Raw experiment description as written by a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    pub exp_id: String,
    #[serde(flatten)]
    pub timesteps: Timesteps,
    pub run_start_date: NaiveDateTime,
    pub run_end_date: NaiveDateTime,
    #[serde(default)]
    pub cpl_scheme: CouplingScheme,
    pub inputs: InputFiles,
    pub forcing: ForcingSeries,
    #[serde(default)]
    pub physics: PhysicsOptions,
}

impl ExperimentDefinition {
    /// Parse a YAML experiment file body.
    pub fn from_yaml(yaml: &str) -> CouplingResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Fully validated experiment, immutable once built.
///
/// Only the coupling scheme (per naive run) and the convergence record (owned by
/// the SWR controller) vary across the runs of one experiment; both live
/// outside this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub exp_id: String,
    pub timesteps: Timesteps,
    pub run_start_date: NaiveDateTime,
    pub run_end_date: NaiveDateTime,
    pub cpl_scheme: CouplingScheme,
    pub inputs: InputFiles,
    pub forcing: ForcingSeries,
    /// Offset of `run_start_date` into the forcing series.
    pub nstrtini: u64,
    pub physics: PhysicsOptions,
}

impl ExperimentConfig {
    /// Validate a definition and resolve its forcing offset.
    pub fn from_definition(definition: ExperimentDefinition) -> CouplingResult<Self> {
        validate_exp_id(&definition.exp_id)?;
        validate_timesteps(&definition)?;

        if definition.physics.with_ice && definition.inputs.ice_restart.is_none() {
            return Err(ValidationError::MissingIceRestart.into());
        }

        let nstrtini = compute_offset(
            definition.run_start_date,
            definition.forcing.start,
            definition.forcing.frequency_hours,
        )?;

        Ok(Self {
            exp_id: definition.exp_id,
            timesteps: definition.timesteps,
            run_start_date: definition.run_start_date,
            run_end_date: definition.run_end_date,
            cpl_scheme: definition.cpl_scheme,
            inputs: definition.inputs,
            forcing: definition.forcing,
            nstrtini,
            physics: definition.physics,
        })
    }

    pub fn window_seconds(&self) -> i64 {
        (self.run_end_date - self.run_start_date).num_seconds()
    }

    /// Number of coupling exchanges over the window.
    pub fn coupling_steps(&self) -> i64 {
        self.window_seconds() / i64::from(self.timesteps.dt_cpl)
    }

    /// Ice step; defaults to the ocean step when not given.
    pub fn ice_timestep(&self) -> u32 {
        self.timesteps.dt_ice.unwrap_or(self.timesteps.dt_ocean)
    }
}

fn validate_exp_id(exp_id: &str) -> Result<(), ValidationError> {
    if exp_id.is_empty() {
        return Err(ValidationError::EmptyExperimentId);
    }
    let allowed = exp_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !allowed || exp_id.starts_with('.') {
        return Err(ValidationError::InvalidExperimentId(exp_id.to_string()));
    }
    Ok(())
}

fn validate_timesteps(definition: &ExperimentDefinition) -> Result<(), ValidationError> {
    let steps = &definition.timesteps;
    let mut components = vec![
        ("atmosphere", steps.dt_atmosphere),
        ("ocean", steps.dt_ocean),
    ];
    if definition.physics.with_ice {
        components.push(("ice", steps.dt_ice.unwrap_or(steps.dt_ocean)));
    }

    if steps.dt_cpl == 0 {
        return Err(ValidationError::NonPositiveTimestep { component: "coupling" });
    }
    for (component, step) in components.iter().copied() {
        if step == 0 {
            return Err(ValidationError::NonPositiveTimestep { component });
        }
    }

    if definition.run_end_date <= definition.run_start_date {
        return Err(ValidationError::EmptyWindow {
            start: definition.run_start_date,
            end: definition.run_end_date,
        });
    }

    let window = definition.run_end_date - definition.run_start_date;
    let window_seconds = window.num_seconds();
    for (component, step) in std::iter::once(("coupling", steps.dt_cpl)).chain(components.iter().copied()) {
        if window.subsec_nanos() != 0 || window_seconds % i64::from(step) != 0 {
            return Err(ValidationError::WindowNotMultiple {
                component,
                window,
                step_seconds: step,
            });
        }
    }

    // Exchanges happen only on sub-model step boundaries.
    for (component, step) in components {
        if steps.dt_cpl % step != 0 {
            return Err(ValidationError::IncommensurateTimestep {
                component,
                step_seconds: step,
                dt_cpl: steps.dt_cpl,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::errors::{AlignmentError, CouplingError};
    use chrono::NaiveDate;

    pub(crate) fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2014, 7, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    pub(crate) fn sample_definition() -> ExperimentDefinition {
        ExperimentDefinition {
            exp_id: "PAPA".to_string(),
            timesteps: Timesteps {
                dt_cpl: 3600,
                dt_atmosphere: 900,
                dt_ocean: 900,
                dt_ice: None,
            },
            run_start_date: at(2, 6),
            run_end_date: at(4, 6),
            cpl_scheme: CouplingScheme::Parallel,
            inputs: InputFiles {
                ocean_restart: PathBuf::from("nemo_restart.nc"),
                ice_restart: None,
                atmosphere_forcing: PathBuf::from("oifs_forcing.nc"),
                atmosphere_boundary: PathBuf::from("rstas.nc"),
                ocean_boundary: PathBuf::from("rstos.nc"),
            },
            forcing: ForcingSeries {
                start: at(1, 0),
                frequency_hours: 6,
            },
            physics: PhysicsOptions::default(),
        }
    }

    #[test]
    fn test_from_definition_resolves_offset() {
        let config = ExperimentConfig::from_definition(sample_definition()).unwrap();
        assert_eq!(config.nstrtini, 5);
        assert_eq!(config.window_seconds(), 2 * 86_400);
        assert_eq!(config.coupling_steps(), 48);
        assert_eq!(config.ice_timestep(), 900);
    }

    #[test]
    fn test_misaligned_start_fails_before_any_run() {
        let mut def = sample_definition();
        def.run_start_date = at(2, 7);
        def.run_end_date = at(4, 7);
        let err = ExperimentConfig::from_definition(def).unwrap_err();
        assert!(matches!(
            err,
            CouplingError::Alignment(AlignmentError::Misaligned { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_window() {
        let mut def = sample_definition();
        def.run_end_date = def.run_start_date;
        let err = ExperimentConfig::from_definition(def).unwrap_err();
        assert!(matches!(
            err,
            CouplingError::Validation(ValidationError::EmptyWindow { .. })
        ));
    }

    #[test]
    fn test_rejects_window_not_multiple_of_coupling() {
        let mut def = sample_definition();
        def.run_end_date = def.run_start_date + chrono::Duration::minutes(90);
        let err = ExperimentConfig::from_definition(def).unwrap_err();
        assert!(matches!(
            err,
            CouplingError::Validation(ValidationError::WindowNotMultiple {
                component: "coupling",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_window_with_fractional_seconds() {
        let mut def = sample_definition();
        def.run_end_date = def.run_end_date + chrono::Duration::milliseconds(250);
        let err = ExperimentConfig::from_definition(def).unwrap_err();
        assert!(matches!(
            err,
            CouplingError::Validation(ValidationError::WindowNotMultiple {
                component: "coupling",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_start_between_forcing_seconds() {
        let mut def = sample_definition();
        def.run_start_date = def.run_start_date + chrono::Duration::milliseconds(500);
        def.run_end_date = def.run_end_date + chrono::Duration::milliseconds(500);
        let err = ExperimentConfig::from_definition(def).unwrap_err();
        assert!(matches!(
            err,
            CouplingError::Alignment(AlignmentError::Misaligned { .. })
        ));
    }

    #[test]
    fn test_rejects_incommensurate_substep() {
        let mut def = sample_definition();
        def.timesteps.dt_ocean = 2400;
        def.run_end_date = def.run_start_date + chrono::Duration::hours(4);
        let err = ExperimentConfig::from_definition(def).unwrap_err();
        assert!(matches!(
            err,
            CouplingError::Validation(ValidationError::IncommensurateTimestep {
                component: "ocean",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_zero_step() {
        let mut def = sample_definition();
        def.timesteps.dt_atmosphere = 0;
        let err = ExperimentConfig::from_definition(def).unwrap_err();
        assert!(matches!(
            err,
            CouplingError::Validation(ValidationError::NonPositiveTimestep {
                component: "atmosphere"
            })
        ));
    }

    #[test]
    fn test_ice_requires_restart() {
        let mut def = sample_definition();
        def.physics.with_ice = true;
        let err = ExperimentConfig::from_definition(def.clone()).unwrap_err();
        assert!(matches!(
            err,
            CouplingError::Validation(ValidationError::MissingIceRestart)
        ));

        def.inputs.ice_restart = Some(PathBuf::from("si3_restart.nc"));
        def.timesteps.dt_ice = Some(1800);
        let config = ExperimentConfig::from_definition(def).unwrap();
        assert_eq!(config.ice_timestep(), 1800);
    }

    #[test]
    fn test_rejects_path_like_exp_id() {
        let mut def = sample_definition();
        def.exp_id = "../escape".to_string();
        assert!(matches!(
            ExperimentConfig::from_definition(def).unwrap_err(),
            CouplingError::Validation(ValidationError::InvalidExperimentId(_))
        ));
    }

    #[test]
    fn test_definition_yaml_parsing() {
        let yaml = r"
exp_id: CEXS
dt_cpl: 3600
dt_atmosphere: 900
dt_ocean: 900
run_start_date: 2014-07-01T00:00:00
run_end_date: 2014-07-05T00:00:00
cpl_scheme: atm-first
inputs:
  ocean_restart: nemo_papa_2014-07-01.nc
  atmosphere_forcing: oifs_papa_2014-07-01_30.nc
  atmosphere_boundary: rstas_2014-07-01_00_era.nc
  ocean_boundary: rstos_2014-07-01.nc
forcing:
  start: 2014-07-01T00:00:00
  frequency_hours: 6
physics:
  atmosphere_levels: 60
  convection_scheme: false
";
        let def = ExperimentDefinition::from_yaml(yaml).expect("YAML should parse");
        assert_eq!(def.cpl_scheme, CouplingScheme::AtmosphereFirst);
        assert_eq!(def.timesteps.dt_cpl, 3600);
        assert!(!def.physics.convection_scheme);
        let config = ExperimentConfig::from_definition(def).unwrap();
        assert_eq!(config.nstrtini, 0);
        assert_eq!(config.physics.atmosphere_levels, Some(60));
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("0".parse::<CouplingScheme>().unwrap(), CouplingScheme::Parallel);
        assert_eq!(
            "ocean-first".parse::<CouplingScheme>().unwrap(),
            CouplingScheme::OceanFirst
        );
        assert!("sideways".parse::<CouplingScheme>().is_err());
        assert_eq!(CouplingScheme::OceanFirst.code(), 2);
    }
}
