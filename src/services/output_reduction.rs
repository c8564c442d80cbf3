//! Output Reduction
//!
//! Prunes debug output from a finished run directory before it is archived.
//! Only top-level regular files are considered; subdirectories, the run
//! record and any protected file survive whatever the patterns say.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info};

use crate::domain::errors::{CouplingError, CouplingResult, ValidationError};
use crate::domain::models::{OutputConfig, DEFAULT_DEBUG_PATTERNS, RECORD_FILE_NAME};

/// Removes files whose names match the configured debug patterns.
#[derive(Debug, Clone)]
pub struct OutputReducer {
    keep_debug_output: bool,
    patterns: Vec<Pattern>,
    protected: Vec<String>,
}

impl OutputReducer {
    pub fn new(config: &OutputConfig) -> CouplingResult<Self> {
        let patterns = config
            .debug_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ValidationError::InvalidDebugPattern {
                    pattern: pattern.clone(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            keep_debug_output: config.keep_debug_output,
            patterns,
            protected: vec![RECORD_FILE_NAME.to_string()],
        })
    }

    /// A reducer that never removes anything.
    pub fn keep_all() -> Self {
        Self {
            keep_debug_output: true,
            patterns: Vec::new(),
            protected: vec![RECORD_FILE_NAME.to_string()],
        }
    }

    /// Never remove a file called `name`, even if a pattern matches it.
    #[must_use]
    pub fn protecting(mut self, name: impl Into<String>) -> Self {
        self.protected.push(name.into());
        self
    }

    fn is_debug_output(&self, name: &str) -> bool {
        !self.protected.iter().any(|kept| kept == name)
            && self.patterns.iter().any(|pattern| pattern.matches(name))
    }

    /// Delete matching files in `dir` and return what was removed.
    pub async fn reduce(&self, dir: &Path) -> CouplingResult<Vec<PathBuf>> {
        if self.keep_debug_output || self.patterns.is_empty() {
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| CouplingError::io(format!("reading {}", dir.display()), e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CouplingError::io(format!("reading {}", dir.display()), e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| CouplingError::io(format!("inspecting {}", entry.path().display()), e))?
                .is_file();
            let name = entry.file_name();
            if !is_file || !name.to_str().is_some_and(|name| self.is_debug_output(name)) {
                continue;
            }

            let path = entry.path();
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| CouplingError::io(format!("removing {}", path.display()), e))?;
            debug!(path = %path.display(), "Debug output removed");
            removed.push(path);
        }

        if !removed.is_empty() {
            info!(directory = %dir.display(), count = removed.len(), "Reduced run output");
        }
        Ok(removed)
    }
}

impl Default for OutputReducer {
    fn default() -> Self {
        Self {
            keep_debug_output: false,
            patterns: DEFAULT_DEBUG_PATTERNS
                .iter()
                .filter_map(|pattern| Pattern::new(pattern).ok())
                .collect(),
            protected: vec![RECORD_FILE_NAME.to_string()],
        }
    }
}
