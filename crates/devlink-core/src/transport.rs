//! Transport abstractions
//!
//! The wire protocol itself is supplied by an external transport library;
//! these traits are the seam the session layer talks through. A dialer
//! produces one live transport per successful connection attempt, and the
//! session owns that transport for its lifetime.

use async_trait::async_trait;
use std::path::Path;

use crate::error::DevlinkResult;

#[cfg(feature = "mock")]
pub mod mock_support;

#[cfg(feature = "mock")]
pub use mock_support::{MockDialer, MockScript, MockTransport};

/// Raw public-key material handed to a dialer for authentication.
///
/// Dialers that delegate authentication to an external trust store may
/// ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCredential {
    /// Hex-encoded public key
    pub public_key: String,
}

/// A live, authenticated connection to one device
///
/// A timed-out connection attempt is cancelled by dropping the transport
/// mid-flight, so implementations must release their underlying
/// resources on drop as well as on [`DeviceTransport::close`].
#[async_trait]
pub trait DeviceTransport: Send {
    /// Run a shell command on the device, returning the combined output.
    async fn shell(&mut self, command: &str) -> DevlinkResult<String>;

    /// Copy a local file to a path on the device.
    async fn push(&mut self, local: &Path, remote: &str) -> DevlinkResult<()>;

    /// Transfer and install a package file in one step.
    async fn install(&mut self, package: &Path) -> DevlinkResult<()>;

    /// Remove an installed package.
    async fn uninstall(&mut self, package_name: &str) -> DevlinkResult<()>;

    /// Close the connection. The transport is unusable afterwards.
    async fn close(&mut self) -> DevlinkResult<()>;
}

/// Establishes transports on behalf of the session layer
#[async_trait]
pub trait TransportDialer: Send + Sync {
    /// Open an authenticated connection to `host:port`.
    async fn dial(
        &self,
        host: &str,
        port: u16,
        credential: &TransportCredential,
    ) -> DevlinkResult<Box<dyn DeviceTransport>>;
}
