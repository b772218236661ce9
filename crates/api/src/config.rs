use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vlabs_core::scripting::RunMode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for active runs to wind down (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Root of the Python automation scripts.
    pub scripts_dir: PathBuf,
    /// Script manifest (default: `<scripts_dir>/scripts.yaml`).
    pub scripts_manifest: PathBuf,
    /// Run history JSON file.
    pub history_file: PathBuf,
    /// Maximum number of history entries kept.
    pub history_max: usize,
    /// Run scripts on the host interpreter or in a container.
    pub run_mode: RunMode,
    /// Image used when `run_mode` is `docker`.
    pub python_image: String,
    /// Interpreter used when `run_mode` is `local`.
    pub python_bin: String,
    /// Default per-run timeout in seconds (default: `1800`).
    pub run_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                        |
    /// |--------------------------|--------------------------------|
    /// | `HOST`                   | `0.0.0.0`                      |
    /// | `PORT`                   | `3001`                         |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`        |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                           |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                           |
    /// | `VLABS_SCRIPTS_DIR`      | `./python_pipeline`            |
    /// | `VLABS_SCRIPTS_MANIFEST` | `<scripts_dir>/scripts.yaml`   |
    /// | `VLABS_HISTORY_FILE`     | `./data/script_history.json`   |
    /// | `VLABS_HISTORY_MAX`      | `50`                           |
    /// | `VLABS_RUN_MODE`         | `local`                        |
    /// | `VLABS_PYTHON_IMAGE`     | `vlabs-python-runner`          |
    /// | `VLABS_PYTHON_BIN`       | `python3`                      |
    /// | `VLABS_RUN_TIMEOUT_SECS` | `1800`                         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "0.0.0.0");
        let port = parse("PORT", var("PORT", "3001"), "u16")?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse(
            "REQUEST_TIMEOUT_SECS",
            var("REQUEST_TIMEOUT_SECS", "30"),
            "u64",
        )?;
        let shutdown_timeout_secs = parse(
            "SHUTDOWN_TIMEOUT_SECS",
            var("SHUTDOWN_TIMEOUT_SECS", "30"),
            "u64",
        )?;

        let scripts_dir = PathBuf::from(var("VLABS_SCRIPTS_DIR", "./python_pipeline"));
        let scripts_manifest = lookup("VLABS_SCRIPTS_MANIFEST")
            .map(PathBuf::from)
            .unwrap_or_else(|| scripts_dir.join("scripts.yaml"));
        let history_file = PathBuf::from(var("VLABS_HISTORY_FILE", "./data/script_history.json"));
        let history_max = parse("VLABS_HISTORY_MAX", var("VLABS_HISTORY_MAX", "50"), "usize")?;
        let run_mode = parse(
            "VLABS_RUN_MODE",
            var("VLABS_RUN_MODE", "local"),
            "run mode (local|docker)",
        )?;
        let python_image = var("VLABS_PYTHON_IMAGE", "vlabs-python-runner");
        let python_bin = var("VLABS_PYTHON_BIN", "python3");
        let run_timeout_secs = parse(
            "VLABS_RUN_TIMEOUT_SECS",
            var("VLABS_RUN_TIMEOUT_SECS", "1800"),
            "u64",
        )?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            scripts_dir,
            scripts_manifest,
            history_file,
            history_max,
            run_mode,
            python_image,
            python_bin,
            run_timeout_secs,
        })
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

fn parse<T: FromStr>(
    key: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid {
            key,
            expected,
            value,
        })
}
