//! Shared cross-cutting concerns for the consumer-pact workspace.
//!
//! This crate provides centralized implementations for:
//! - Pluggable tracing output sinks (console, JSON, test-runner capture)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod tracing_config;

pub use tracing_config::{LogOutput, TracingConfig, init_tracing};
