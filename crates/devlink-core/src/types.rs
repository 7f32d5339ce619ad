//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DEFAULT_DEVICE_PORT;

/// Connection status for a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// No session is active
    Disconnected,
    /// A connection attempt is in flight
    Connecting,
    /// A session is active and validated
    Connected,
    /// The last operation failed
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of the connection lifecycle, replaced wholesale on every
/// transition. Observers never see partial updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub device_address: Option<String>,
    pub error_message: Option<String>,
}

impl ConnectionState {
    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            device_address: None,
            error_message: None,
        }
    }

    pub fn connecting() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            device_address: None,
            error_message: None,
        }
    }

    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Connected,
            device_address: Some(address.into()),
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Error,
            device_address: None,
            error_message: Some(message.into()),
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Lifecycle of a single package transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    Idle,
    Transferring,
    Paused,
    Completed,
    Error,
}

/// Progress of a package transfer.
///
/// For a single install the state only moves forward
/// (`Idle -> Transferring -> {Completed, Error}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub state: TransferState,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// Bytes per second
    pub speed: u64,
    pub estimated_seconds_remaining: u32,
    pub error_message: Option<String>,
}

impl TransferProgress {
    /// Fraction of the transfer completed, 0.0 when the total is unknown.
    pub fn progress(&self) -> f64 {
        if self.total_bytes > 0 {
            self.bytes_transferred as f64 / self.total_bytes as f64
        } else {
            0.0
        }
    }

    /// Whole-percent progress, truncated.
    pub fn progress_percent(&self) -> u8 {
        (self.progress() * 100.0) as u8
    }
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self {
            state: TransferState::Idle,
            bytes_transferred: 0,
            total_bytes: 0,
            speed: 0,
            estimated_seconds_remaining: 0,
            error_message: None,
        }
    }
}

/// Metadata for one installed third-party package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub package_name: String,
    pub app_name: String,
    pub version_name: String,
    pub version_code: String,
}

/// A device endpoint, `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host[:port]`, falling back to the default device port when
    /// the port is absent or unparsable.
    pub fn parse(input: &str) -> Self {
        Self::parse_with_port(input, DEFAULT_DEVICE_PORT)
    }

    /// Like [`DeviceAddress::parse`], with a caller-chosen fallback port.
    pub fn parse_with_port(input: &str, default_port: u16) -> Self {
        match input.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.trim().parse().unwrap_or(default_port);
                Self::new(host.trim(), port)
            }
            None => Self::new(input.trim(), default_port),
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
