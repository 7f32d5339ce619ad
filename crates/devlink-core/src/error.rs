//! Core error types for devlink

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type DevlinkResult<T> = Result<T, DevlinkError>;

/// Top-level error type for device operations
#[derive(Error, Debug)]
pub enum DevlinkError {
    /// Operation attempted without a live session
    #[error("not connected to device")]
    NotConnected,

    /// Caller-supplied input was rejected before any I/O
    #[error("validation failed: {0}")]
    Validation(String),

    /// Connection establishment exceeded its bound
    #[error("connection timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// Liveness probe mismatch or transport-reported failure
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Identity credential error
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DevlinkError {
    /// Build a validation error from anything displayable.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a protocol error from anything displayable.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Identity-credential errors
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Failed to read a key artifact
    #[error("failed to read key artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a key artifact
    #[error("failed to write key artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key artifact exists but does not decode to a usable key pair
    #[error("malformed key artifact {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error_carries_bound() {
        let err = DevlinkError::Timeout {
            limit: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_not_connected_display() {
        assert_eq!(
            DevlinkError::NotConnected.to_string(),
            "not connected to device"
        );
    }

    #[test]
    fn test_identity_error_wraps_into_top_level() {
        let err: DevlinkError = IdentityError::Malformed {
            path: PathBuf::from("/tmp/identity_key"),
            reason: "bad hex".to_string(),
        }
        .into();
        assert!(matches!(err, DevlinkError::Identity(_)));
    }
}
