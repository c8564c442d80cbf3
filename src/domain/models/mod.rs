pub mod config;
pub mod convergence;
pub mod experiment;
pub mod run_key;
pub mod snapshot;
pub mod trajectory;

pub use config::{
    Config, LoggingConfig, OutputConfig, RetentionPolicy, RunnerConfig, SwrDefaults,
    DEFAULT_DEBUG_PATTERNS,
};
pub use convergence::{
    ConvergenceRecord, IterationRecord, NormKind, NormStatus, NormValues, SwrOutcome, SwrParams,
    SwrState, TerminalState,
};
pub use experiment::{
    CouplingScheme, ExperimentConfig, ExperimentDefinition, ForcingSeries, InputFiles,
    PhysicsOptions, Timesteps,
};
pub use run_key::{RunKey, RunLabel};
pub use snapshot::{BoundaryInput, RunRecord, RunSnapshot, RECORD_FILE_NAME};
pub use trajectory::Trajectory;
