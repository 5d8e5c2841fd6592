use std::fmt;
use thiserror::Error;

use crate::domain::path::{JsonPath, PathError};

/// Which store resource a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Template,
    SavedPayload,
    LatestPayload,
    Change,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resource::Template => "template",
            Resource::SavedPayload => "saved payload",
            Resource::LatestPayload => "latest payload",
            Resource::Change => "change",
        };
        f.write_str(s)
    }
}

/// Failures reported by a [`PayloadStore`](crate::domain::ports::PayloadStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Absent resource. Recoverable: callers fall back to defaults.
    #[error("{resource} not found for {key}")]
    NotFound { resource: Resource, key: String },

    /// Store unreachable or answered with a non-success status.
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("malformed store response: {message}")]
    Decode { message: String },
}

impl StoreError {
    pub fn not_found(resource: Resource, key: impl Into<String>) -> Self {
        StoreError::NotFound {
            resource,
            key: key.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        StoreError::Transport {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Why a single decision was dropped from a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("set decision at {path} has no value")]
    MissingValue { path: JsonPath },

    #[error("cannot resolve {path}: {source}")]
    Path {
        path: JsonPath,
        #[source]
        source: PathError,
    },
}

/// Misuse of a [`ComparisonSession`](crate::application::session::ComparisonSession).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is {state}, expected a loaded comparison")]
    NotReady { state: &'static str },

    #[error("no submittable decisions pending")]
    NothingToSave,

    /// A response for a customer or request that is no longer current.
    /// Swallowed by the session, never shown to the operator.
    #[error("stale response for {customer}")]
    StaleResponse { customer: String },
}
