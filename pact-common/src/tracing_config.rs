//! Tracing subscriber setup with pluggable output sinks.
//!
//! Match and mismatch traces from the mock server are a side channel: they go
//! to whichever sinks the test run asks for, and installing them twice (one
//! harness per test, many tests per process) is not an error.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt as tfmt};

/// A destination for human-readable traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Plain formatted lines on stdout
    Console,
    /// One JSON object per event on stdout
    Json,
    /// Formatted lines routed through the test harness capture
    TestWriter,
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Console => "console",
            Self::Json => "json",
            Self::TestWriter => "test",
        })
    }
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            "test" | "testwriter" => Ok(Self::TestWriter),
            other => Err(format!("unknown log output '{other}'")),
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Log level filter, overridden by `RUST_LOG` when set
    pub log_level: String,
    /// Output sinks; empty means tracing stays uninstalled
    pub outputs: Vec<LogOutput>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "consumer-pact".to_string(),
            log_level: "info".to_string(),
            outputs: vec![LogOutput::TestWriter],
        }
    }
}

impl TracingConfig {
    /// Create config with custom service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Create config with custom log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the output sinks.
    #[must_use]
    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = LogOutput>) -> Self {
        self.outputs = outputs.into_iter().collect();
        self
    }
}

fn output_layer(output: LogOutput) -> Box<dyn Layer<Registry> + Send + Sync> {
    match output {
        LogOutput::Console => tfmt::layer().boxed(),
        LogOutput::Json => tfmt::layer().json().boxed(),
        LogOutput::TestWriter => tfmt::layer().with_test_writer().boxed(),
    }
}

/// Install the global tracing subscriber for the configured sinks.
///
/// Returns `Ok(false)` without touching global state when no sinks are
/// configured.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<bool, TryInitError> {
    if config.outputs.is_empty() {
        return Ok(false);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let layers: Vec<_> = config.outputs.iter().copied().map(output_layer).collect();

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    tracing::debug!(service = %config.service_name, "Tracing initialized");
    Ok(true)
}
