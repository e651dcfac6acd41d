//! Layered runner configuration.
//!
//! Precedence, lowest first: built-in defaults, `callplan.toml` (or the file
//! named by `CALLPLAN_CONFIG_PATH`), `CALLPLAN_*` environment variables, then
//! command-line flags applied by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::{RetryPolicy, RunnerSettings};

pub const DEFAULT_CONFIG_FILE: &str = "callplan.toml";
pub const CONFIG_PATH_ENV: &str = "CALLPLAN_CONFIG_PATH";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse env var {key}={value}: {message}")]
    InvalidEnv {
        key: String,
        value: String,
        message: String,
    },
    #[error("Invalid {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// JSON array of test cases
    pub test_cases_file: PathBuf,
    pub model_name: String,
    /// Directory of enhanced-ABI JSON files used as the candidate set
    pub enhanced_abis_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Base URL of the agent service backing the model collaborators
    pub agent_base_url: String,
    pub test_timeout_secs: f64,
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub inter_test_delay_secs: f64,
    pub parallel_limit: usize,
    pub max_contracts: usize,
    pub save_results: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_cases_file: PathBuf::from("tests/test_cases.json"),
            model_name: "o3-mini".to_string(),
            enhanced_abis_dir: PathBuf::from("data/enhanced_abis"),
            output_dir: PathBuf::from("tests/results"),
            agent_base_url: "http://127.0.0.1:8000".to_string(),
            test_timeout_secs: 30.0,
            max_retries: 2,
            retry_delay_secs: 1.0,
            inter_test_delay_secs: 0.5,
            parallel_limit: 3,
            max_contracts: 3,
            save_results: true,
        }
    }
}

impl RunnerConfig {
    /// Defaults, then the config file, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        let explicit = lookup(CONFIG_PATH_ENV)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let mut config = match explicit.or_else(|| find_default_config_path(DEFAULT_CONFIG_FILE)) {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("No {DEFAULT_CONFIG_FILE} found; using built-in defaults");
                Self::default()
            }
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Unreadable or invalid files fall back to defaults.
    pub fn from_file(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to read runner config file; using built-in defaults"
                );
                return Self::default();
            }
        };
        toml::from_str(&content).unwrap_or_else(|err| {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Failed to parse runner config TOML; using built-in defaults"
            );
            Self::default()
        })
    }

    /// Overlay `CALLPLAN_*` variables from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CALLPLAN_TEST_CASES") {
            self.test_cases_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("CALLPLAN_MODEL") {
            self.model_name = v;
        }
        if let Some(v) = lookup("CALLPLAN_ENHANCED_ABIS_DIR") {
            self.enhanced_abis_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CALLPLAN_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CALLPLAN_AGENT_URL") {
            self.agent_base_url = v;
        }
        env_parse(&lookup, "CALLPLAN_TEST_TIMEOUT_SECS", &mut self.test_timeout_secs)?;
        env_parse(&lookup, "CALLPLAN_MAX_RETRIES", &mut self.max_retries)?;
        env_parse(&lookup, "CALLPLAN_RETRY_DELAY_SECS", &mut self.retry_delay_secs)?;
        env_parse(
            &lookup,
            "CALLPLAN_INTER_TEST_DELAY_SECS",
            &mut self.inter_test_delay_secs,
        )?;
        env_parse(&lookup, "CALLPLAN_PARALLEL_LIMIT", &mut self.parallel_limit)?;
        env_parse(&lookup, "CALLPLAN_MAX_CONTRACTS", &mut self.max_contracts)?;
        env_parse(&lookup, "CALLPLAN_SAVE_RESULTS", &mut self.save_results)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        secs("test_timeout_secs", self.test_timeout_secs)?;
        secs("retry_delay_secs", self.retry_delay_secs)?;
        secs("inter_test_delay_secs", self.inter_test_delay_secs)?;
        if self.test_timeout_secs == 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "test_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.parallel_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "parallel_limit",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn runner_settings(&self) -> Result<RunnerSettings, ConfigError> {
        Ok(RunnerSettings {
            model_name: self.model_name.clone(),
            test_cases_file: self.test_cases_file.clone(),
            output_dir: self.output_dir.clone(),
            test_timeout: secs("test_timeout_secs", self.test_timeout_secs)?,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                retry_delay: secs("retry_delay_secs", self.retry_delay_secs)?,
            },
            inter_test_delay: secs("inter_test_delay_secs", self.inter_test_delay_secs)?,
            parallel_limit: self.parallel_limit,
        })
    }
}

fn secs(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::InvalidValue {
        field,
        message: format!("{value} is not a valid number of seconds: {e}"),
    })
}

fn env_parse<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(());
    };
    *slot = raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: raw.clone(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Search the current directory and its ancestors for `relative_path`.
pub fn find_default_config_path(relative_path: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;
    loop {
        let candidate = current.join(relative_path);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    None
}
