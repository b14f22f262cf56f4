//! # Service Configuration
//!
//! Read once from the environment at startup. Every setting has a default
//! so the service starts with nothing configured: in-memory persistence,
//! in-memory snapshots, the built-in step table, and no address lookup.
//!
//! | Variable                      | Default                 |
//! |-------------------------------|-------------------------|
//! | `INTAKE_PORT`                 | `8080`                  |
//! | `DATABASE_URL`                | unset (in-memory)       |
//! | `INTAKE_UPLOAD_DIR`           | `./uploads`             |
//! | `INTAKE_PUBLIC_BASE_URL`      | `http://localhost:8080` |
//! | `INTAKE_SNAPSHOT_DIR`         | unset (in-memory)       |
//! | `INTAKE_STEPS_FILE`           | unset (built-in steps)  |
//! | `GEOAPIFY_API_KEY`            | unset (lookup disabled) |
//! | `INTAKE_FETCH_TIMEOUT_SECS`   | `10`                    |
//! | `INTAKE_DEBOUNCE_MS`          | `300`                   |
//! | `INTAKE_SESSION_IDLE_SECS`    | `1800`                  |
//! | `INTAKE_APPLICATION_VERSION`  | `v1`                    |
//! | `INTAKE_METRICS_ENABLED`      | `true`                  |
//! | `INTAKE_CORS_ORIGIN`          | unset (no CORS layer)   |
//! | `INTAKE_LOG_FORMAT`           | `text` (`json` option)  |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A variable was set to something unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value for {var}: {value:?} ({reason})")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub upload_dir: PathBuf,
    /// Prefix for returned file URLs.
    pub public_base_url: String,
    pub snapshot_dir: Option<PathBuf>,
    pub steps_file: Option<PathBuf>,
    pub geoapify_api_key: Option<String>,
    pub fetch_timeout: Duration,
    pub debounce_window: Duration,
    /// Sessions untouched for this long are closed by the idle sweep.
    pub session_idle_timeout: Duration,
    /// Form version flag, echoed in session views.
    pub application_version: String,
    pub metrics_enabled: bool,
    pub cors_origin: Option<String>,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            upload_dir: PathBuf::from("./uploads"),
            public_base_url: "http://localhost:8080".to_string(),
            snapshot_dir: None,
            steps_file: None,
            geoapify_api_key: None,
            fetch_timeout: Duration::from_secs(10),
            debounce_window: intake_client::debounce::DEFAULT_WINDOW,
            session_idle_timeout: Duration::from_secs(30 * 60),
            application_version: "v1".to_string(),
            metrics_enabled: true,
            cors_origin: None,
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Read from an arbitrary lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("INTAKE_PORT") {
            Some(v) => parse_num::<u16>("INTAKE_PORT", &v)?,
            None => defaults.port,
        };
        let fetch_timeout = match get("INTAKE_FETCH_TIMEOUT_SECS") {
            Some(v) => positive_secs("INTAKE_FETCH_TIMEOUT_SECS", v)?,
            None => defaults.fetch_timeout,
        };
        let session_idle_timeout = match get("INTAKE_SESSION_IDLE_SECS") {
            Some(v) => positive_secs("INTAKE_SESSION_IDLE_SECS", v)?,
            None => defaults.session_idle_timeout,
        };
        // Clamped by the debouncer itself.
        let debounce_window = match get("INTAKE_DEBOUNCE_MS") {
            Some(v) => Duration::from_millis(parse_num::<u64>("INTAKE_DEBOUNCE_MS", &v)?),
            None => defaults.debounce_window,
        };
        let metrics_enabled = get("INTAKE_METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(defaults.metrics_enabled);
        let log_format = match get("INTAKE_LOG_FORMAT").map(|v| v.to_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            Some(v) if v == "text" => LogFormat::Text,
            Some(v) => {
                return Err(ConfigError {
                    var: "INTAKE_LOG_FORMAT",
                    value: v,
                    reason: "expected text or json".into(),
                })
            }
            None => defaults.log_format,
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            upload_dir: get("INTAKE_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            public_base_url: get("INTAKE_PUBLIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            snapshot_dir: get("INTAKE_SNAPSHOT_DIR").map(PathBuf::from),
            steps_file: get("INTAKE_STEPS_FILE").map(PathBuf::from),
            geoapify_api_key: get("GEOAPIFY_API_KEY"),
            fetch_timeout,
            debounce_window,
            session_idle_timeout,
            application_version: get("INTAKE_APPLICATION_VERSION")
                .unwrap_or(defaults.application_version),
            metrics_enabled,
            cors_origin: get("INTAKE_CORS_ORIGIN"),
            log_format,
        })
    }
}

fn parse_num<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn positive_secs(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    match parse_num::<u64>(var, &value)? {
        0 => Err(ConfigError {
            var,
            value,
            reason: "must be positive".into(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}
