//! SWR Coupler - Schwarz waveform relaxation for coupled atmosphere-ocean runs
//!
//! Drives an external coupled atmosphere-ocean-sea-ice model over a fixed
//! simulation window, either once per coupling scheme ("naive" runs) or
//! iteratively with Schwarz waveform relaxation until the interface
//! trajectories stop changing.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): experiment, snapshot and convergence models,
//!   errors, forcing time alignment, and the port traits the model is driven
//!   through
//! - **Service Layer** (`services`): SWR controller, naive driver, convergence
//!   monitor, run directory management
//! - **Adapters** (`adapters`): process runner, YAML renderer, JSON trajectory extractor
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use swr_coupler::adapters::{JsonTrajectoryExtractor, ProcessModelRunner, YamlConfigRenderer};
//! use swr_coupler::domain::models::{Config, ExperimentConfig, ExperimentDefinition, SwrParams};
//! use swr_coupler::services::{RunDirectoryManager, SwrController};
//!
//! # async fn example(yaml: &str) -> anyhow::Result<()> {
//! let config = Config::default();
//! let experiment = ExperimentConfig::from_definition(ExperimentDefinition::from_yaml(yaml)?)?;
//! let controller = SwrController::new(
//!     Arc::new(experiment),
//!     Arc::new(ProcessModelRunner::new(config.runner.clone())),
//!     Arc::new(JsonTrajectoryExtractor::default()),
//!     Arc::new(YamlConfigRenderer::new()),
//!     Arc::new(RunDirectoryManager::new(&config.output_root)),
//! );
//! let outcome = controller.run(SwrParams::default()).await?;
//! assert!(outcome.final_iteration() >= 1);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{AlignmentError, CouplingError, CouplingResult, ValidationError};
pub use domain::time_alignment::compute_offset;
pub use domain::models::{
    Config, ConvergenceRecord, CouplingScheme, ExperimentConfig, ExperimentDefinition, NormKind,
    RunKey, RunLabel, RunSnapshot, SwrOutcome, SwrParams, SwrState, TerminalState, Trajectory,
};
pub use domain::ports::{
    CancelHandle, ConfigRenderer, ModelRunner, RunArtifacts, RunContext, TrajectoryExtractor,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ConvergenceMonitor, NaiveCouplingDriver, RunDirectoryManager, SwrController,
};
