//! Harness configuration with environment overrides.
//!
//! Values come from `PACT_*` environment variables (after loading a `.env`
//! file when present) with defaults suitable for running inside `cargo test`.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use pact_common::{LogOutput, TracingConfig};
use thiserror::Error;

/// Environment variable that overrides the provider name.
pub const PROVIDER_ENV_VAR: &str = "PACT_PROVIDER";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Timeout value that can never succeed
    #[error("Invalid timeout for {field}: must be greater than 0")]
    InvalidTimeout {
        /// Offending field
        field: String,
    },

    /// Empty contract directory
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// How a contract file is updated when one already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace the whole document
    #[default]
    Overwrite,
    /// Keep existing interactions, replacing those with the same key
    Merge,
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown write mode '{other}'")),
        }
    }
}

/// Contract testing configuration.
#[derive(Debug, Clone)]
pub struct PactConfig {
    /// Directory receiving `{consumer}-{provider}.json` documents
    pub pact_dir: PathBuf,
    /// Log level for the tracing sinks
    pub log_level: String,
    /// Tracing sinks installed when the harness is created
    pub log_outputs: Vec<LogOutput>,
    /// Address the mock server binds (port is always ephemeral)
    pub host: IpAddr,
    /// Upper bound on binding the mock server socket
    pub bind_timeout: Duration,
    /// Upper bound on draining connections at teardown
    pub shutdown_timeout: Duration,
    /// Contract update policy
    pub write_mode: WriteMode,
}

impl Default for PactConfig {
    fn default() -> Self {
        Self {
            pact_dir: PathBuf::from("./target/pacts"),
            log_level: "info".to_string(),
            log_outputs: vec![LogOutput::TestWriter],
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
            write_mode: WriteMode::Overwrite,
        }
    }
}

impl PactConfig {
    /// Loads configuration from the process environment with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            pact_dir: lookup("PACT_DIR").map_or(defaults.pact_dir, PathBuf::from),
            log_level: lookup("PACT_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_outputs: match lookup("PACT_LOG_OUTPUTS") {
                Some(raw) => parse_list("PACT_LOG_OUTPUTS", &raw)?,
                None => defaults.log_outputs,
            },
            host: parse_var(&lookup, "PACT_HOST", defaults.host)?,
            bind_timeout: parse_millis(&lookup, "PACT_BIND_TIMEOUT_MS", defaults.bind_timeout)?,
            shutdown_timeout: parse_millis(
                &lookup,
                "PACT_SHUTDOWN_TIMEOUT_MS",
                defaults.shutdown_timeout,
            )?,
            write_mode: parse_var(&lookup, "PACT_WRITE_MODE", defaults.write_mode)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for zero timeouts or an empty contract directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                field: "bind_timeout".to_string(),
            });
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                field: "shutdown_timeout".to_string(),
            });
        }
        if self.pact_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("pact_dir".to_string()));
        }
        Ok(())
    }

    /// Set the contract directory.
    #[must_use]
    pub fn with_pact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pact_dir = dir.into();
        self
    }

    /// Set the log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the tracing sinks.
    #[must_use]
    pub fn with_log_outputs(mut self, outputs: impl IntoIterator<Item = LogOutput>) -> Self {
        self.log_outputs = outputs.into_iter().collect();
        self
    }

    /// Set the bind timeout.
    #[must_use]
    pub const fn with_bind_timeout(mut self, timeout: Duration) -> Self {
        self.bind_timeout = timeout;
        self
    }

    /// Set the teardown drain timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the contract update policy.
    #[must_use]
    pub const fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Destination of the contract between `consumer` and `provider`.
    #[must_use]
    pub fn contract_path(&self, consumer: &str, provider: &str) -> PathBuf {
        contract_file_in(&self.pact_dir, consumer, provider)
    }

    /// Tracing settings derived from this configuration.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig::default()
            .with_service_name("consumer-pact")
            .with_log_level(&self.log_level)
            .with_outputs(self.log_outputs.iter().copied())
    }
}

/// File name convention shared by writer and reader.
#[must_use]
pub fn contract_file_in(dir: &Path, consumer: &str, provider: &str) -> PathBuf {
    dir.join(format!("{consumer}-{provider}.json"))
}

/// Resolve the provider name from `PACT_PROVIDER`, falling back to `default`.
#[must_use]
pub fn resolve_provider_name(default: &str) -> String {
    resolve_provider_name_from(|name| env::var(name).ok(), default)
}

/// Resolve the provider name through an arbitrary variable lookup.
///
/// Blank overrides are ignored.
#[must_use]
pub fn resolve_provider_name_from<F>(lookup: F, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(PROVIDER_ENV_VAR)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_millis<F>(lookup: &F, name: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_var(lookup, name, default_ms).map(Duration::from_millis)
}

fn parse_list<T>(name: &str, raw: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse().map_err(|e: T::Err| ConfigError::ParseError {
                name: name.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PactConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.pact_dir, PathBuf::from("./target/pacts"));
        assert_eq!(config.bind_timeout, Duration::from_secs(5));
        assert_eq!(config.write_mode, WriteMode::Overwrite);
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_env_overrides() {
        let config = PactConfig::from_lookup(lookup_from(&[
            ("PACT_DIR", "/tmp/pacts"),
            ("PACT_LOG_LEVEL", "debug"),
            ("PACT_LOG_OUTPUTS", "console, json"),
            ("PACT_BIND_TIMEOUT_MS", "250"),
            ("PACT_WRITE_MODE", "Merge"),
        ]))
        .unwrap();

        assert_eq!(config.pact_dir, PathBuf::from("/tmp/pacts"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_outputs, vec![LogOutput::Console, LogOutput::Json]);
        assert_eq!(config.bind_timeout, Duration::from_millis(250));
        assert_eq!(config.write_mode, WriteMode::Merge);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = PactConfig::from_lookup(lookup_from(&[("PACT_BIND_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref name, .. } if name == "PACT_BIND_TIMEOUT_MS"));

        let err = PactConfig::from_lookup(lookup_from(&[("PACT_BIND_TIMEOUT_MS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));

        let err = PactConfig::from_lookup(lookup_from(&[("PACT_WRITE_MODE", "append")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_contract_path() {
        let config = PactConfig::default().with_pact_dir("/tmp/pacts");
        assert_eq!(
            config.contract_path("web", "products"),
            PathBuf::from("/tmp/pacts/web-products.json")
        );
    }

    #[test]
    fn test_provider_name_resolution() {
        let default = "pactflow-example-bi-directional-provider-dotnet";
        assert_eq!(resolve_provider_name_from(lookup_from(&[]), default), default);
        assert_eq!(
            resolve_provider_name_from(lookup_from(&[(PROVIDER_ENV_VAR, "products-v2")]), default),
            "products-v2"
        );
        assert_eq!(
            resolve_provider_name_from(lookup_from(&[(PROVIDER_ENV_VAR, "  ")]), default),
            default
        );
    }
}
