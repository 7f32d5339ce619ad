//! Device session lifecycle and command execution
//!
//! A `DeviceSession` owns at most one live transport. Establishment runs
//! on a dedicated task so it can be hard-cancelled at the configured
//! timeout, and the handle is only ever mutated by `connect`/`disconnect`
//! under a single mutex: a second `connect` always tears down the first
//! session before proceeding (last caller wins).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use devlink_core::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_DEVICE_PORT};
use devlink_core::error::{DevlinkError, DevlinkResult};
use devlink_core::transport::{DeviceTransport, TransportDialer};

use crate::identity::IdentityManager;

/// Command sent to validate a fresh connection.
pub const LIVENESS_PROBE: &str = "echo devlink_probe";
/// Exact reply expected from the liveness probe.
pub const LIVENESS_REPLY: &str = "devlink_probe";

struct SessionHandle {
    transport: Box<dyn DeviceTransport>,
    address: String,
}

/// The single live authenticated connection to a device
pub struct DeviceSession {
    dialer: Arc<dyn TransportDialer>,
    identity: IdentityManager,
    handle: Mutex<Option<SessionHandle>>,
    connected: AtomicBool,
}

impl DeviceSession {
    pub fn new(dialer: Arc<dyn TransportDialer>, identity: IdentityManager) -> Self {
        Self {
            dialer,
            identity,
            handle: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Connect to `host` on the default port with the default timeout.
    pub async fn connect_default(&self, host: &str) -> DevlinkResult<String> {
        self.connect(host, DEFAULT_DEVICE_PORT, DEFAULT_CONNECT_TIMEOUT)
            .await
    }

    /// Establish and validate a session, returning the `host:port`
    /// address on success.
    ///
    /// The attempt (dial plus liveness probe) runs on its own task and is
    /// aborted if it exceeds `timeout`; an aborted attempt drops its
    /// half-open transport, which releases the underlying connection. No
    /// failure path leaves a half-initialized handle behind.
    pub async fn connect(&self, host: &str, port: u16, timeout: Duration) -> DevlinkResult<String> {
        let mut handle = self.handle.lock().await;

        // Last caller wins: tear down any existing session first.
        if let Some(mut previous) = handle.take() {
            self.connected.store(false, Ordering::SeqCst);
            if let Err(e) = previous.transport.close().await {
                tracing::warn!(
                    "Failed to close superseded session {}: {}",
                    previous.address,
                    e
                );
            }
        }

        let credential = self.identity.get_or_create()?.transport_credential();
        let dialer = Arc::clone(&self.dialer);
        let target_host = host.to_string();

        let mut attempt = tokio::spawn(async move {
            let mut transport = dialer.dial(&target_host, port, &credential).await?;

            let probe = transport.shell(LIVENESS_PROBE).await;
            let valid = matches!(&probe, Ok(reply) if reply.trim() == LIVENESS_REPLY);
            if !valid {
                let _ = transport.close().await;
                return Err(DevlinkError::protocol("connection validation failed"));
            }

            Ok(transport)
        });

        let address = format!("{}:{}", host, port);
        let outcome = tokio::time::timeout(timeout, &mut attempt).await;
        match outcome {
            Ok(Ok(Ok(transport))) => {
                *handle = Some(SessionHandle {
                    transport,
                    address: address.clone(),
                });
                self.connected.store(true, Ordering::SeqCst);
                tracing::info!("Connected successfully to {}", address);
                Ok(address)
            }
            Ok(Ok(Err(e))) => {
                self.connected.store(false, Ordering::SeqCst);
                tracing::error!("Connection to {} failed: {}", address, e);
                Err(e)
            }
            Ok(Err(join_error)) => {
                self.connected.store(false, Ordering::SeqCst);
                tracing::error!("Connection worker for {} failed: {}", address, join_error);
                Err(DevlinkError::protocol(format!(
                    "connection worker failed: {}",
                    join_error
                )))
            }
            Err(_) => {
                attempt.abort();
                self.connected.store(false, Ordering::SeqCst);
                tracing::error!("Connection to {} timed out after {:?}", address, timeout);
                Err(DevlinkError::Timeout { limit: timeout })
            }
        }
    }

    /// Close the current session. Idempotent: disconnecting with no live
    /// session is a success no-op. The handle and connected flag are
    /// always cleared, even when closing the transport fails.
    pub async fn disconnect(&self) -> DevlinkResult<()> {
        let mut handle = self.handle.lock().await;
        self.connected.store(false, Ordering::SeqCst);

        match handle.take() {
            None => Ok(()),
            Some(mut previous) => match previous.transport.close().await {
                Ok(()) => {
                    tracing::info!("Disconnected from {}", previous.address);
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("Transport close failed for {}: {}", previous.address, e);
                    Err(e)
                }
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Shared precondition for every higher-level operation: fail before
    /// any transport I/O when no session is live.
    pub fn ensure_connected(&self) -> DevlinkResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DevlinkError::NotConnected)
        }
    }

    /// Address of the live session, if any.
    pub async fn device_address(&self) -> Option<String> {
        self.handle.lock().await.as_ref().map(|h| h.address.clone())
    }

    /// Run a shell command on the device, returning the trimmed combined
    /// output.
    pub async fn execute(&self, command: &str) -> DevlinkResult<String> {
        self.ensure_connected()?;
        let mut handle = self.handle.lock().await;
        let session = handle.as_mut().ok_or(DevlinkError::NotConnected)?;

        let output = session.transport.shell(command).await?;
        Ok(output.trim().to_string())
    }

    /// Transfer and install a package file in one step.
    pub async fn install_package(&self, package: &Path) -> DevlinkResult<()> {
        self.ensure_connected()?;
        if !package.is_file() {
            return Err(DevlinkError::validation(format!(
                "package file not found: {}",
                package.display()
            )));
        }

        let mut handle = self.handle.lock().await;
        let session = handle.as_mut().ok_or(DevlinkError::NotConnected)?;
        session.transport.install(package).await
    }

    /// Remove an installed package by name.
    pub async fn uninstall_package(&self, package_name: &str) -> DevlinkResult<()> {
        self.ensure_connected()?;
        if package_name.trim().is_empty() {
            return Err(DevlinkError::validation("package name cannot be empty"));
        }

        let mut handle = self.handle.lock().await;
        let session = handle.as_mut().ok_or(DevlinkError::NotConnected)?;
        session.transport.uninstall(package_name).await
    }

    /// Copy a local file to a path on the device.
    pub async fn push(&self, local: &Path, remote: &str) -> DevlinkResult<()> {
        self.ensure_connected()?;
        if !local.is_file() {
            return Err(DevlinkError::validation(format!(
                "local file not found: {}",
                local.display()
            )));
        }
        if remote.trim().is_empty() {
            return Err(DevlinkError::validation("remote path cannot be empty"));
        }

        let mut handle = self.handle.lock().await;
        let session = handle.as_mut().ok_or(DevlinkError::NotConnected)?;
        session.transport.push(local, remote).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_core::transport::{MockDialer, MockScript};
    use std::io::Write;

    fn session_over(dialer: MockDialer) -> DeviceSession {
        DeviceSession::new(Arc::new(dialer), IdentityManager::ephemeral())
    }

    fn connected_session(script: &MockScript) -> DeviceSession {
        session_over(MockDialer::new(script.clone()))
    }

    #[tokio::test]
    async fn test_connect_success() {
        let script = MockScript::new();
        let session = connected_session(&script);

        let address = session.connect_default("192.168.1.50").await.unwrap();
        assert_eq!(address, "192.168.1.50:5555");
        assert!(session.is_connected());
        assert_eq!(session.device_address().await.as_deref(), Some("192.168.1.50:5555"));
        assert_eq!(script.shell_log(), vec![LIVENESS_PROBE.to_string()]);
    }

    #[tokio::test]
    async fn test_second_connect_supersedes_first() {
        let script = MockScript::new();
        let session = connected_session(&script);

        session.connect_default("10.0.0.1").await.unwrap();
        let address = session.connect_default("10.0.0.2").await.unwrap();

        assert_eq!(address, "10.0.0.2:5555");
        assert!(session.is_connected());
        // The first handle was released when the second connect won.
        assert_eq!(script.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_is_bounded() {
        let script = MockScript::new();
        let dialer = MockDialer::new(script.clone()).with_delay(Duration::from_secs(60));
        let session = session_over(dialer);

        let err = session
            .connect("10.0.0.9", 5555, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DevlinkError::Timeout { limit } if limit == Duration::from_secs(5)
        ));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_probe_mismatch() {
        let script = MockScript::new();
        script.reply(LIVENESS_PROBE, "something else");
        let session = connected_session(&script);

        let err = session.connect_default("10.0.0.3").await.unwrap_err();
        assert!(matches!(err, DevlinkError::Protocol(_)));
        assert!(!session.is_connected());
        // The half-open transport was closed, not leaked.
        assert_eq!(script.close_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_dial_failure() {
        let script = MockScript::new();
        let dialer = MockDialer::new(script).with_failure("connection refused");
        let session = session_over(dialer);

        let err = session.connect_default("10.0.0.4").await.unwrap_err();
        assert!(matches!(err, DevlinkError::Protocol(_)));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let script = MockScript::new();
        let session = connected_session(&script);

        // No session yet: success no-op.
        session.disconnect().await.unwrap();
        assert!(!session.is_connected());

        session.connect_default("10.0.0.5").await.unwrap();
        session.disconnect().await.unwrap();
        session.disconnect().await.unwrap();

        assert!(!session.is_connected());
        assert_eq!(script.close_count(), 1);
    }

    #[tokio::test]
    async fn test_execute_requires_connection() {
        let script = MockScript::new();
        let session = connected_session(&script);

        let err = session.execute("echo hi").await.unwrap_err();
        assert!(matches!(err, DevlinkError::NotConnected));
        assert_eq!(script.call_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_trims_output() {
        let script = MockScript::new();
        script.reply("getprop ro.product.model", "  Pixel 8  \n");
        let session = connected_session(&script);
        session.connect_default("10.0.0.6").await.unwrap();

        let output = session.execute("getprop ro.product.model").await.unwrap();
        assert_eq!(output, "Pixel 8");
    }

    #[tokio::test]
    async fn test_install_package_validates_file() {
        let script = MockScript::new();
        let session = connected_session(&script);
        session.connect_default("10.0.0.7").await.unwrap();

        let err = session
            .install_package(Path::new("/nonexistent/app.apk"))
            .await
            .unwrap_err();
        assert!(matches!(err, DevlinkError::Validation(_)));
        assert!(script.installed().is_empty());
    }

    #[tokio::test]
    async fn test_install_package_delegates() {
        let script = MockScript::new();
        let session = connected_session(&script);
        session.connect_default("10.0.0.8").await.unwrap();

        let mut apk = tempfile::NamedTempFile::new().unwrap();
        apk.write_all(b"not a real package").unwrap();

        session.install_package(apk.path()).await.unwrap();
        assert_eq!(script.installed(), vec![apk.path().to_path_buf()]);
    }

    #[tokio::test]
    async fn test_uninstall_package_validates_name() {
        let script = MockScript::new();
        let session = connected_session(&script);
        session.connect_default("10.0.0.10").await.unwrap();

        let err = session.uninstall_package("   ").await.unwrap_err();
        assert!(matches!(err, DevlinkError::Validation(_)));
        assert!(script.uninstalled().is_empty());
    }

    #[tokio::test]
    async fn test_push_validates_inputs() {
        let script = MockScript::new();
        let session = connected_session(&script);
        session.connect_default("10.0.0.11").await.unwrap();

        let err = session
            .push(Path::new("/nonexistent/file"), "/data/local/tmp/file")
            .await
            .unwrap_err();
        assert!(matches!(err, DevlinkError::Validation(_)));

        let local = tempfile::NamedTempFile::new().unwrap();
        let err = session.push(local.path(), "  ").await.unwrap_err();
        assert!(matches!(err, DevlinkError::Validation(_)));
        assert!(script.pushed().is_empty());
    }
}
