//! Config renderer port.

use async_trait::async_trait;

use crate::domain::models::RunSnapshot;

/// Turns a run snapshot into whatever input files the model needs, written
/// into the snapshot's run directory. Called once per run, before the runner.
#[async_trait]
pub trait ConfigRenderer: Send + Sync {
    async fn render(&self, snapshot: &RunSnapshot) -> anyhow::Result<()>;
}
