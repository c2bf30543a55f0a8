//! Runner configuration
//!
//! Defines all configurable parameters for the engine: the workspace root,
//! the global pipeline deadline, the cancel-flag poll interval, and the
//! per-SDK executor command tables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use playpen_core::domain::Sdk;

/// Application configuration
///
/// All timeouts and intervals are configurable to allow tuning for
/// different deployment scenarios (dev vs prod).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory under which per-pipeline workspaces are created
    pub working_dir: PathBuf,

    /// Maximum wall-clock time one pipeline may spend across all stages
    pub pipeline_execute_timeout: Duration,

    /// How often the cancel watcher polls the cache for the cancel flag
    pub cancel_check_interval: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            pipeline_execute_timeout: Duration::from_secs(600),
            cancel_check_interval: Duration::from_millis(500),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - WORKING_DIR (required)
    /// - PIPELINE_EXECUTE_TIMEOUT (optional, seconds, default: 600)
    /// - CANCEL_CHECK_INTERVAL_MS (optional, milliseconds, default: 500)
    pub fn from_env() -> Result<Self> {
        let working_dir = std::env::var("WORKING_DIR")
            .map(PathBuf::from)
            .map_err(|_| anyhow::anyhow!("WORKING_DIR environment variable not set"))?;

        let pipeline_execute_timeout = std::env::var("PIPELINE_EXECUTE_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(600));

        let cancel_check_interval = std::env::var("CANCEL_CHECK_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(500));

        Ok(Self {
            working_dir,
            pipeline_execute_timeout,
            cancel_check_interval,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.working_dir.as_os_str().is_empty() {
            anyhow::bail!("working_dir cannot be empty");
        }

        if self.cancel_check_interval.is_zero() {
            anyhow::bail!("cancel_check_interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("playpen"))
    }
}

/// External commands used to compile and run snippets of one SDK.
///
/// Mirrors the JSON executor configuration files the backend ships per
/// SDK; args hold the static part of the command line, the executor
/// builder appends the per-pipeline paths.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub compile_cmd: String,
    #[serde(default)]
    pub compile_args: Vec<String>,
    pub run_cmd: String,
    #[serde(default)]
    pub run_args: Vec<String>,
}

impl ExecutorConfig {
    /// Built-in command table for an SDK.
    ///
    /// Returns None for SDKs without executor support.
    pub fn for_sdk(sdk: Sdk) -> Option<Self> {
        match sdk {
            Sdk::Java => Some(Self {
                compile_cmd: "javac".to_string(),
                compile_args: vec!["-d".to_string(), "bin".to_string()],
                run_cmd: "java".to_string(),
                run_args: vec!["-cp".to_string(), "bin".to_string()],
            }),
            Sdk::Go => Some(Self {
                compile_cmd: "go".to_string(),
                compile_args: vec![
                    "build".to_string(),
                    "-o".to_string(),
                    "bin/main".to_string(),
                ],
                run_cmd: String::new(),
                run_args: vec![],
            }),
            Sdk::Python => Some(Self {
                compile_cmd: String::new(),
                compile_args: vec![],
                run_cmd: "python3".to_string(),
                run_args: vec![],
            }),
            Sdk::Scio => None,
        }
    }

    /// Parses an executor configuration from its JSON representation.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config = serde_json::from_str(raw)?;
        Ok(config)
    }
}

/// Environment of the SDK a pipeline was submitted for: the SDK tag plus
/// the executor command table to drive it with.
#[derive(Debug, Clone)]
pub struct SdkEnv {
    pub sdk: Sdk,
    pub executor_config: Option<ExecutorConfig>,
}

impl SdkEnv {
    /// Creates the environment for an SDK using the built-in command table.
    pub fn new(sdk: Sdk) -> Self {
        Self {
            sdk,
            executor_config: ExecutorConfig::for_sdk(sdk),
        }
    }

    /// Creates the environment with an explicit command table.
    pub fn with_config(sdk: Sdk, executor_config: ExecutorConfig) -> Self {
        Self {
            sdk,
            executor_config: Some(executor_config),
        }
    }
}
