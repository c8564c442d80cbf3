//! External coupled model process runner.
//!
//! Spawns the configured executable inside the run directory and waits for
//! it. Stdout and stderr go to log files next to the model output so nothing
//! is buffered in memory for multi-hour runs.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::yaml_renderer::RUN_CONFIG_FILE_NAME;
use crate::domain::models::{BoundaryInput, RunSnapshot, RunnerConfig};
use crate::domain::ports::{ModelRunner, RunArtifacts, RunContext};

pub const STDOUT_LOG: &str = "model.stdout.log";
pub const STDERR_LOG: &str = "model.stderr.log";

/// Lines of stderr quoted in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Runs one coupled simulation per call by spawning an external program.
///
/// The program runs with the run directory as its working directory and
/// receives the run's identity through `SWR_*` environment variables:
///
/// | Variable | Value |
/// |---|---|
/// | `SWR_RUN_ID` | id shared by all runs of one invocation |
/// | `SWR_EXP_ID` | experiment id |
/// | `SWR_RUN_LABEL` | `iter_<n>`, `parallel`, ... |
/// | `SWR_CPL_SCHEME` | coupling scheme code (0, 1, 2) |
/// | `SWR_NSTRTINI` | forcing offset |
/// | `SWR_RUN_CONFIG` | rendered run configuration |
/// | `SWR_BOUNDARY_DIR` | previous iterate (SWR iterations 2+) |
pub struct ProcessModelRunner {
    config: RunnerConfig,
}

impl ProcessModelRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Relative paths with a directory component are resolved against the
    /// current directory, since the child runs elsewhere.
    fn resolve_executable(&self) -> Result<PathBuf> {
        let path = PathBuf::from(&self.config.executable);
        if path.is_relative() && path.components().count() > 1 {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            return Ok(cwd.join(path));
        }
        Ok(path)
    }

    fn build_command(&self, snapshot: &RunSnapshot) -> Result<Command> {
        let dir = &snapshot.run_directory;
        let stdout = std::fs::File::create(dir.join(STDOUT_LOG))
            .with_context(|| format!("Failed to create {STDOUT_LOG} in {}", dir.display()))?;
        let stderr = std::fs::File::create(dir.join(STDERR_LOG))
            .with_context(|| format!("Failed to create {STDERR_LOG} in {}", dir.display()))?;

        let mut cmd = Command::new(self.resolve_executable()?);
        cmd.args(&self.config.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        cmd.env("SWR_RUN_ID", snapshot.run_id.to_string())
            .env("SWR_EXP_ID", snapshot.exp_id())
            .env("SWR_RUN_LABEL", snapshot.label.dir_name())
            .env("SWR_CPL_SCHEME", snapshot.cpl_scheme.code().to_string())
            .env("SWR_NSTRTINI", snapshot.experiment.nstrtini.to_string())
            .env("SWR_RUN_CONFIG", dir.join(RUN_CONFIG_FILE_NAME));
        if let BoundaryInput::PreviousIteration { directory, .. } = &snapshot.boundary {
            cmd.env("SWR_BOUNDARY_DIR", directory);
        }
        Ok(cmd)
    }
}

#[async_trait]
impl ModelRunner for ProcessModelRunner {
    async fn run(&self, snapshot: &RunSnapshot, ctx: RunContext) -> Result<RunArtifacts> {
        let mut cancel = ctx.cancel;
        let dir = snapshot.run_directory.clone();
        let started = Instant::now();

        let mut child = self
            .build_command(snapshot)?
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.config.executable))?;
        info!(
            run = %snapshot.label,
            pid = ?child.id(),
            directory = %dir.display(),
            "Model process started"
        );

        let limit = self.config.timeout_seconds.map(Duration::from_secs);
        let deadline = async {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let status = tokio::select! {
            status = child.wait() => status.context("Failed to wait for model process")?,
            _ = cancel.cancelled() => {
                warn!(run = %snapshot.label, "Cancellation requested, killing model process");
                child.kill().await.ok();
                bail!("model run {} cancelled", snapshot.label);
            }
            _ = deadline => {
                warn!(run = %snapshot.label, "Model process timed out, killing it");
                child.kill().await.ok();
                bail!(
                    "model run {} exceeded {}s",
                    snapshot.label,
                    self.config.timeout_seconds.unwrap_or_default()
                );
            }
        };

        let elapsed = started.elapsed();
        if !status.success() {
            let tail = stderr_tail(&dir).await;
            bail!(
                "model exited with {} after {:.1}s{}",
                status,
                elapsed.as_secs_f64(),
                if tail.is_empty() {
                    String::new()
                } else {
                    format!(":\n{tail}")
                }
            );
        }

        debug!(run = %snapshot.label, elapsed_secs = elapsed.as_secs_f64(), "Model process finished");
        Ok(RunArtifacts {
            outputs: list_outputs(&dir).await?,
            directory: dir,
            elapsed,
        })
    }
}

async fn stderr_tail(dir: &Path) -> String {
    let Ok(text) = tokio::fs::read_to_string(dir.join(STDERR_LOG)).await else {
        return String::new();
    };
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Top-level files written into the run directory, sorted.
async fn list_outputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    let mut outputs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            outputs.push(PathBuf::from(entry.file_name()));
        }
    }
    outputs.sort();
    Ok(outputs)
}
