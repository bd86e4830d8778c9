//! Error types for the routedns system
//!
//! This module defines all error types used throughout the workspace.
//! Each variant belongs to one of three propagation classes:
//!
//! - **Fatal**: `Config`, `StoreCorrupt`: the process exits
//! - **Pass-level**: `UpstreamUnavailable`, `MalformedResponse`, `StoreUnavailable`:
//!   the current pass is abandoned and retried on schedule
//! - **Per-item**: `UpdateRejected`, `UpdateTimeout`, `UpdateUnreachable`:
//!   logged, the hostname is retried next pass

use thiserror::Error;

/// Result type alias for routedns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the routedns system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The proxy API could not be reached or answered with a non-success status
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The proxy API answered with a payload that is not a router list
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The DNS server refused the update transaction
    #[error("Update rejected for {hostname}: {reason}")]
    UpdateRejected {
        /// Hostname the update was for
        hostname: String,
        /// Response code or local reason
        reason: String,
    },

    /// The DNS server did not answer within the per-call timeout
    #[error("Update timed out for {0}")]
    UpdateTimeout(String),

    /// The DNS server could not be reached
    #[error("Update failed for {hostname}: server unreachable: {reason}")]
    UpdateUnreachable {
        /// Hostname the update was for
        hostname: String,
        /// Underlying transport error
        reason: String,
    },

    /// The state file exists but does not match the expected schema
    #[error("State store corrupt: {0}")]
    StoreCorrupt(String),

    /// The state file could not be read or written
    #[error("State store unavailable: {0}")]
    StoreUnavailable(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an upstream-unavailable error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    /// Create a malformed-response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create an update-rejected error
    pub fn rejected(hostname: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpdateRejected {
            hostname: hostname.into(),
            reason: reason.into(),
        }
    }

    /// Create an update-timeout error
    pub fn timeout(hostname: impl Into<String>) -> Self {
        Self::UpdateTimeout(hostname.into())
    }

    /// Create an update-unreachable error
    pub fn unreachable(hostname: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpdateUnreachable {
            hostname: hostname.into(),
            reason: reason.into(),
        }
    }

    /// Create a store-corrupt error
    pub fn store_corrupt(msg: impl Into<String>) -> Self {
        Self::StoreCorrupt(msg.into())
    }

    /// Create a store-unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Whether this error must terminate the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::StoreCorrupt(_))
    }
}
