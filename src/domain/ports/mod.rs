//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the async trait interfaces the external coupled model
//! is driven through:
//! - ModelRunner: executes one coupled simulation
//! - TrajectoryExtractor: reads the interface time series of a finished run
//! - ConfigRenderer: writes the model's configuration for one run
//!
//! The services depend only on these traits, so any physical model can be
//! plugged in.

pub mod cancellation;
pub mod config_renderer;
pub mod model_runner;
pub mod trajectory_extractor;

pub use cancellation::{CancelHandle, CancelSignal};
pub use config_renderer::ConfigRenderer;
pub use model_runner::{ModelRunner, RunArtifacts, RunContext};
pub use trajectory_extractor::TrajectoryExtractor;
