//! Error types for contract registration, mock serving and contract writing.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the contract testing harness.
///
/// Request mismatches are not errors inside the mock server; they are served
/// to the client as diagnostic `500` responses and only surface here, after
/// teardown, as [`PactError::MismatchedRequests`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PactError {
    /// Two interactions share the same description and provider state
    #[error("Duplicate interaction '{description}'{}", state_suffix(.provider_state.as_deref()))]
    DuplicateDescription {
        /// Interaction description
        description: String,
        /// Provider state of the duplicated interaction
        provider_state: Option<String>,
    },

    /// Interaction cannot be served or documented as declared
    #[error("Invalid interaction '{description}': {reason}")]
    InvalidInteraction {
        /// Interaction description
        description: String,
        /// What is wrong with it
        reason: String,
    },

    /// Matcher construction failed
    #[error("Invalid matcher: {reason}")]
    InvalidMatcher {
        /// What is wrong with the matcher
        reason: String,
    },

    /// Mock server failed to bind or is already listening
    #[error("Mock server failed to start: {reason}")]
    ServerStart {
        /// Bind failure, timeout or lifecycle violation
        reason: String,
    },

    /// Registered interactions that the test never exercised
    #[error("Unmet expectations, interactions never invoked: {}", .interactions.join(", "))]
    UnmetExpectations {
        /// Descriptions of the uninvoked interactions
        interactions: Vec<String>,
    },

    /// Requests the mock server could not match to any interaction
    #[error("Mock server received unexpected requests: {}", .requests.join("; "))]
    MismatchedRequests {
        /// One summary per failed request
        requests: Vec<String>,
    },

    /// The user-supplied test body failed
    #[error("Test body failed: {0}")]
    TestFailed(#[source] anyhow::Error),

    /// The user-supplied test body exceeded the caller's time limit
    #[error("Test body timed out after {after:?}")]
    TestTimeout {
        /// The limit that was exceeded
        after: Duration,
    },

    /// Contract file could not be written
    #[error("Failed to write contract {path}: {reason}")]
    Serialization {
        /// Destination that was being written
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Contract document could not be read back into interactions
    #[error("Invalid contract document: {0}")]
    InvalidContract(String),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn state_suffix(state: Option<&str>) -> String {
    state.map(|s| format!(" given '{s}'")).unwrap_or_default()
}

impl PactError {
    /// Create a server start error.
    #[must_use]
    pub fn server_start(reason: impl Into<String>) -> Self {
        Self::ServerStart {
            reason: reason.into(),
        }
    }

    /// Create an invalid matcher error.
    #[must_use]
    pub fn invalid_matcher(reason: impl Into<String>) -> Self {
        Self::InvalidMatcher {
            reason: reason.into(),
        }
    }

    /// Create an invalid interaction error.
    #[must_use]
    pub fn invalid_interaction(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInteraction {
            description: description.into(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error for the given destination.
    #[must_use]
    pub fn serialization(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Serialization {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid contract error.
    #[must_use]
    pub fn invalid_contract(reason: impl Into<String>) -> Self {
        Self::InvalidContract(reason.into())
    }
}
