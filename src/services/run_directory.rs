//! Run Directory Manager
//!
//! Owns the filesystem namespace below the output root:
//!
//! - Live runs write into `<output_root>/.staging/<exp_id>`. At most one live
//!   directory may be claimed per experiment. The claim is a
//!   `<output_root>/.staging/<exp_id>.claim` file created exclusively and
//!   holding the owner's pid, so managers in separate processes (or separate
//!   managers in one process) see each other's claims.
//! - Finished runs are committed to `<output_root>/<exp_id>/<label>` and
//!   recorded in a `(exp_id, label)` registry.
//!
//! Committing is a two-phase move: a plain rename when source and destination
//! share a filesystem, otherwise a copy into `<destination>.partial` followed
//! by a rename into place. Every step can be re-run after a crash.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{RunKey, RunRecord, RECORD_FILE_NAME};

const STAGING_DIR: &str = ".staging";
const PARTIAL_SUFFIX: &str = ".partial";
const CLAIM_SUFFIX: &str = ".claim";

/// Contents of an on-disk claim file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaimFile {
    pid: u32,
    claimed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Registry {
    /// exp_id -> claimed staging directory
    live: HashMap<String, PathBuf>,
    archived: BTreeMap<RunKey, PathBuf>,
}

/// Creates, commits and removes run directories for every experiment below
/// one output root.
///
/// The one-live-directory-per-experiment claim is the only coordination
/// between concurrent users of the output root. It is held both in memory and
/// as a claim file next to the staging directory.
#[derive(Debug)]
pub struct RunDirectoryManager {
    output_root: PathBuf,
    registry: RwLock<Registry>,
}

impl RunDirectoryManager {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Where an experiment's live run is staged.
    pub fn staging_dir(&self, exp_id: &str) -> PathBuf {
        self.output_root.join(STAGING_DIR).join(exp_id)
    }

    /// Directory holding every archived run of an experiment.
    pub fn archive_root(&self, exp_id: &str) -> PathBuf {
        self.output_root.join(exp_id)
    }

    /// Final location of an archived run.
    pub fn destination_for(&self, key: &RunKey) -> PathBuf {
        self.archive_root(&key.exp_id).join(key.label.dir_name())
    }

    /// Claim file guarding the staging directory of `exp_id`.
    pub fn claim_path(&self, exp_id: &str) -> PathBuf {
        self.output_root
            .join(STAGING_DIR)
            .join(format!("{exp_id}{CLAIM_SUFFIX}"))
    }

    /// Claim a fresh live directory for `exp_id`.
    ///
    /// A stale staging directory left behind by a crashed process is cleared,
    /// but only once the claim file is ours. A claim file whose owner process
    /// is gone is taken over. Fails with `DirectoryConflict` while an earlier
    /// claim is neither archived nor discarded, in this or any other live
    /// process.
    #[instrument(skip(self))]
    pub async fn acquire(&self, exp_id: &str) -> CouplingResult<PathBuf> {
        let mut registry = self.registry.write().await;
        if let Some(existing) = registry.live.get(exp_id) {
            return Err(CouplingError::DirectoryConflict {
                exp_id: exp_id.to_string(),
                path: existing.clone(),
            });
        }

        let path = self.staging_dir(exp_id);
        let staging_root = self.output_root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging_root)
            .await
            .map_err(|e| CouplingError::io(format!("creating {}", staging_root.display()), e))?;
        self.claim_on_disk(exp_id, &path).await?;

        if let Err(err) = self.prepare_staging(&path).await {
            remove_claim(&self.claim_path(exp_id)).await?;
            return Err(err);
        }

        registry.live.insert(exp_id.to_string(), path.clone());
        debug!(path = %path.display(), "Run directory acquired");
        Ok(path)
    }

    async fn prepare_staging(&self, path: &Path) -> CouplingResult<()> {
        if exists(path).await? {
            warn!(path = %path.display(), "Clearing stale staging directory");
            remove_tree(path).await?;
        }
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| CouplingError::io(format!("creating {}", path.display()), e))
    }

    /// Create the claim file exclusively, taking over one left by a dead process.
    async fn claim_on_disk(&self, exp_id: &str, staging: &Path) -> CouplingResult<()> {
        let claim = self.claim_path(exp_id);
        let conflict = || CouplingError::DirectoryConflict {
            exp_id: exp_id.to_string(),
            path: staging.to_path_buf(),
        };

        for _ in 0..2 {
            match write_claim(&claim).await {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => {
                    return Err(CouplingError::io(format!("creating {}", claim.display()), err))
                }
            }

            let Some(holder) = read_claim(&claim).await else {
                error!(
                    claim = %claim.display(),
                    "Unreadable claim file, remove it by hand if no run is active"
                );
                return Err(conflict());
            };
            if is_process_alive(holder.pid).await {
                debug!(pid = holder.pid, "Staging directory claimed by a live process");
                return Err(conflict());
            }
            warn!(
                claim = %claim.display(),
                pid = holder.pid,
                claimed_at = %holder.claimed_at,
                "Taking over claim of a process that is no longer running"
            );
            remove_claim(&claim).await?;
        }
        Err(conflict())
    }

    /// Drop in-memory and on-disk claims held by `path`.
    async fn release_claims(&self, path: &Path) -> CouplingResult<()> {
        let mut registry = self.registry.write().await;
        let released: Vec<String> = registry
            .live
            .iter()
            .filter(|(_, claimed)| claimed.as_path() == path)
            .map(|(exp_id, _)| exp_id.clone())
            .collect();
        for exp_id in released {
            registry.live.remove(&exp_id);
            remove_claim(&self.claim_path(&exp_id)).await?;
        }
        Ok(())
    }

    /// Move a finished run from `source` to `destination`.
    ///
    /// Safe to call again after a partial or completed earlier attempt:
    /// an existing destination is treated as committed and only the leftover
    /// source is removed. Releases any live claim held by `source`.
    #[instrument(skip(self), fields(source = %source.display(), destination = %destination.display()))]
    pub async fn archive(&self, source: &Path, destination: &Path) -> CouplingResult<()> {
        let source_exists = exists(source).await?;
        let destination_exists = exists(destination).await?;

        match (source_exists, destination_exists) {
            (false, true) => {
                debug!("Already archived");
            }
            (true, true) => {
                warn!("Destination already committed, removing leftover source");
                remove_tree(source).await?;
            }
            (false, false) => {
                return Err(CouplingError::MissingRunDirectory(source.to_path_buf()));
            }
            (true, false) => {
                if let Some(parent) = destination.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        CouplingError::io(format!("creating {}", parent.display()), e)
                    })?;
                }
                if let Err(err) = tokio::fs::rename(source, destination).await {
                    debug!(error = %err, "Rename failed, falling back to copy");
                    commit_by_copy(source, destination).await?;
                }
                info!("Run directory archived");
            }
        }

        self.release_claims(source).await
    }

    /// Archive `source` under the registry key `key` and return the final path.
    pub async fn archive_run(&self, source: &Path, key: RunKey) -> CouplingResult<PathBuf> {
        let destination = self.destination_for(&key);
        self.archive(source, &destination).await?;
        self.registry
            .write()
            .await
            .archived
            .insert(key, destination.clone());
        Ok(destination)
    }

    /// Recursively remove `path`. A missing path is not an error.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn discard(&self, path: &Path) -> CouplingResult<()> {
        if exists(path).await? {
            remove_tree(path).await?;
            debug!("Run directory discarded");
        }
        self.release_claims(path).await?;
        self.registry
            .write()
            .await
            .archived
            .retain(|_, archived| archived.as_path() != path);
        Ok(())
    }

    /// Fail if the experiment's archive root already holds runs.
    ///
    /// Keeps a second invocation from silently mixing its iterations with a
    /// previous one.
    pub async fn ensure_fresh(&self, exp_id: &str) -> CouplingResult<()> {
        let root = self.archive_root(exp_id);
        if !exists(&root).await? {
            return Ok(());
        }
        let mut entries = tokio::fs::read_dir(&root)
            .await
            .map_err(|e| CouplingError::io(format!("reading {}", root.display()), e))?;
        let populated = entries
            .next_entry()
            .await
            .map_err(|e| CouplingError::io(format!("reading {}", root.display()), e))?
            .is_some();
        if populated {
            return Err(CouplingError::DirectoryConflict {
                exp_id: exp_id.to_string(),
                path: root,
            });
        }
        Ok(())
    }

    pub async fn archived(&self, key: &RunKey) -> Option<PathBuf> {
        self.registry.read().await.archived.get(key).cloned()
    }

    /// Every archived run of `exp_id`, ordered by label.
    pub async fn archived_for(&self, exp_id: &str) -> Vec<(RunKey, PathBuf)> {
        self.registry
            .read()
            .await
            .archived
            .iter()
            .filter(|(key, _)| key.exp_id == exp_id)
            .map(|(key, path)| (key.clone(), path.clone()))
            .collect()
    }

    pub async fn live(&self, exp_id: &str) -> Option<PathBuf> {
        self.registry.read().await.live.get(exp_id).cloned()
    }

    /// Persist `record` as `swr_record.yaml` inside `dir`.
    pub async fn write_record(&self, dir: &Path, record: &RunRecord) -> CouplingResult<()> {
        let path = dir.join(RECORD_FILE_NAME);
        let yaml = serde_yaml::to_string(record)?;
        tokio::fs::write(&path, yaml)
            .await
            .map_err(|e| CouplingError::io(format!("writing {}", path.display()), e))
    }
}

/// Read the `swr_record.yaml` stored in a run directory.
pub async fn read_record(dir: &Path) -> CouplingResult<RunRecord> {
    let path = dir.join(RECORD_FILE_NAME);
    let yaml = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| CouplingError::io(format!("reading {}", path.display()), e))?;
    Ok(serde_yaml::from_str(&yaml)?)
}

async fn exists(path: &Path) -> CouplingResult<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| CouplingError::io(format!("checking {}", path.display()), e))
}

async fn remove_tree(path: &Path) -> CouplingResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(CouplingError::io(format!("removing {}", path.display()), err)),
    }
}

async fn write_claim(claim: &Path) -> io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(claim)
        .await?;
    let body = serde_json::to_vec(&ClaimFile {
        pid: std::process::id(),
        claimed_at: Utc::now(),
    })
    .map_err(io::Error::other)?;
    file.write_all(&body).await?;
    file.sync_all().await
}

async fn read_claim(claim: &Path) -> Option<ClaimFile> {
    let body = tokio::fs::read(claim).await.ok()?;
    serde_json::from_slice(&body).ok()
}

async fn remove_claim(claim: &Path) -> CouplingResult<()> {
    match tokio::fs::remove_file(claim).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(CouplingError::io(format!("removing {}", claim.display()), err)),
    }
}

/// Whether `pid` names a running process. Platforms without a probe count
/// every holder as alive so a claim is never stolen.
async fn is_process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }

    #[cfg(unix)]
    {
        use std::process::Stdio;
        tokio::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success())
    }

    #[cfg(windows)]
    {
        tokio::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}")])
            .output()
            .await
            .is_ok_and(|output| String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()))
    }

    #[cfg(not(any(unix, windows)))]
    {
        true
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

/// Cross-filesystem commit: copy into a sibling `.partial`, rename it into
/// place, then drop the source.
async fn commit_by_copy(source: &Path, destination: &Path) -> CouplingResult<()> {
    let partial = partial_path(destination);
    remove_tree(&partial).await?;

    let (from, to) = (source.to_path_buf(), partial.clone());
    tokio::task::spawn_blocking(move || copy_tree(&from, &to))
        .await
        .map_err(|e| CouplingError::io("copy task panicked", io::Error::other(e)))?
        .map_err(|e| {
            CouplingError::io(
                format!("copying {} to {}", source.display(), partial.display()),
                e,
            )
        })?;

    tokio::fs::rename(&partial, destination).await.map_err(|e| {
        CouplingError::io(
            format!("committing {} to {}", partial.display(), destination.display()),
            e,
        )
    })?;
    remove_tree(source).await
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if std::fs::metadata(entry.path())?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
