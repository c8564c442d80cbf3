use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure for the coupler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Root under which staging and archived run directories live
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Coupled model executable
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Default SWR iteration parameters
    #[serde(default)]
    pub swr: SwrDefaults,

    /// What to keep of the SWR iterates once a run ends
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Pruning of debug output before a run is archived
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_output_root() -> PathBuf {
    PathBuf::from("output")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            logging: LoggingConfig::default(),
            runner: RunnerConfig::default(),
            swr: SwrDefaults::default(),
            retention: RetentionPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// External coupled model invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Executable that runs one coupled simulation in the current directory
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Extra command line arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Wall-clock limit per model run; unlimited when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_executable() -> String {
    "./run_coupled_model.sh".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            args: Vec::new(),
            timeout_seconds: None,
            env: HashMap::new(),
        }
    }
}

/// Default SWR iteration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SwrDefaults {
    #[serde(default = "default_max_iters")]
    pub max_iters: u32,

    #[serde(default = "default_rel_tol")]
    pub rel_tol: f64,

    #[serde(default = "default_stop_at_convergence")]
    pub stop_at_convergence: bool,
}

const fn default_max_iters() -> u32 {
    30
}

const fn default_rel_tol() -> f64 {
    1e-5
}

const fn default_stop_at_convergence() -> bool {
    true
}

impl Default for SwrDefaults {
    fn default() -> Self {
        Self {
            max_iters: default_max_iters(),
            rel_tol: default_rel_tol(),
            stop_at_convergence: default_stop_at_convergence(),
        }
    }
}

/// Caller-side policy for archived SWR iterates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep every iterate.
    #[default]
    KeepAll,
    /// Keep only the last iterate.
    KeepFinal,
    /// Keep the first iterate (equivalent to a parallel naive run) and the last.
    KeepFirstAndFinal,
}

/// Files removed from every successful run directory before it is archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    /// Keep everything the model wrote
    #[serde(default)]
    pub keep_debug_output: bool,

    /// Glob patterns matched against file names in the run directory
    #[serde(default = "default_debug_patterns")]
    pub debug_patterns: Vec<String>,
}

/// OASIS coupler traces, NEMO abort dumps and core files.
pub const DEFAULT_DEBUG_PATTERNS: [&str; 5] = [
    "debug.*",
    "debug_notroot.*",
    "output.abort*",
    "core",
    "core.*",
];

fn default_debug_patterns() -> Vec<String> {
    DEFAULT_DEBUG_PATTERNS.iter().map(ToString::to_string).collect()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            keep_debug_output: false,
            debug_patterns: default_debug_patterns(),
        }
    }
}
