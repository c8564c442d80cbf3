//! Model runner port - interface to the coupled model executable.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::cancellation::CancelSignal;
use crate::domain::models::RunSnapshot;

/// Outputs of one finished model run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    /// Run directory the model wrote into.
    pub directory: PathBuf,
    /// Files the model produced, relative to `directory`.
    pub outputs: Vec<PathBuf>,
    pub elapsed: Duration,
}

impl RunArtifacts {
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            outputs: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Per-invocation context.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Lets long runs abort when the caller cancels. Honouring it is optional.
    pub cancel: CancelSignal,
}

/// Executes exactly one coupled simulation.
///
/// This is a long, blocking operation from the caller's point of view; it
/// either completes and leaves its output in `snapshot.run_directory`, or fails.
/// Failures are opaque to the caller.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    async fn run(&self, snapshot: &RunSnapshot, ctx: RunContext) -> anyhow::Result<RunArtifacts>;
}
