//! Adapters connecting the coupling services to a real model installation.

pub mod json_extractor;
pub mod process_runner;
pub mod yaml_renderer;

pub use json_extractor::JsonTrajectoryExtractor;
pub use process_runner::ProcessModelRunner;
pub use yaml_renderer::YamlConfigRenderer;
