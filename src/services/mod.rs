pub mod convergence_monitor;
pub mod ensemble_summary;
pub mod naive_driver;
pub mod output_reduction;
pub mod retention;
pub mod run_directory;
pub mod swr_controller;

pub use convergence_monitor::ConvergenceMonitor;
pub use ensemble_summary::{summarize, EnsembleSummary, ExperimentStatus, ExperimentSummary, IterationStats};
pub use naive_driver::{NaiveCouplingDriver, NaiveOutcome, NaiveRun};
pub use output_reduction::OutputReducer;
pub use retention::apply_retention;
pub use run_directory::{read_record, RunDirectoryManager};
pub use swr_controller::SwrController;
