//! Error types shared by every grantflow crate.
//!
//! All fallible operations return `GrantResult<T>`. Variants carry the key or
//! a reason string so a failure can be logged without further context.

use thiserror::Error;

/// The unified error type for grantflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    /// A request was issued with no capability keys at all.
    #[error("grant request requires at least one capability key")]
    EmptyKeySet,

    /// A synchronous platform query ran while no host was attached.
    #[error("no host is attached to the coordinator")]
    HostDetached,

    /// A second pending entry was registered for a key that already has one.
    ///
    /// Overwriting would orphan every subscriber of the first entry, so the
    /// registry refuses instead.
    #[error("a request for capability '{key}' is already pending")]
    DuplicatePending { key: String },

    /// The platform delivered a batch result whose arrays do not line up.
    #[error("malformed batch result: {reason}")]
    MalformedBatchResult { reason: String },

    /// The platform could not dispatch a grant request.
    #[error("platform request failed: {reason}")]
    Platform { reason: String },

    /// The post-grant verification hook could not reach a decision.
    #[error("post-grant verification of '{key}' failed: {reason}")]
    Verification { key: String, reason: String },

    /// A diagnostic artifact could not be serialized.
    #[error("serialization failed: {reason}")]
    Serialization { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the grantflow crates.
pub type GrantResult<T> = Result<T, GrantError>;
