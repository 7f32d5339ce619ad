//! Subprocess-backed transport dialer
//!
//! Delegates the wire protocol to the platform debug-bridge binary. The
//! external tool manages its own trust store, so the session credential
//! is not forwarded here. Spawn failures surface as I/O errors; failures
//! the tool reports in its output surface as protocol errors.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use devlink_core::error::{DevlinkError, DevlinkResult};
use devlink_core::transport::{DeviceTransport, TransportCredential, TransportDialer};

/// Dials devices through the `adb` binary
pub struct AdbExecDialer {
    binary: PathBuf,
}

impl AdbExecDialer {
    pub fn new() -> Self {
        Self::with_binary("adb")
    }

    /// Use a specific binary instead of resolving `adb` from `PATH`.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for AdbExecDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportDialer for AdbExecDialer {
    async fn dial(
        &self,
        host: &str,
        port: u16,
        _credential: &TransportCredential,
    ) -> DevlinkResult<Box<dyn DeviceTransport>> {
        let address = format!("{}:{}", host, port);
        let output = run(&self.binary, &["connect", &address]).await?;

        // The tool reports refusal in its output rather than its exit code.
        if !output.contains("connected to") {
            return Err(DevlinkError::protocol(format!(
                "connect to {} failed: {}",
                address,
                output.trim()
            )));
        }

        Ok(Box::new(AdbExecTransport {
            binary: self.binary.clone(),
            address,
        }))
    }
}

struct AdbExecTransport {
    binary: PathBuf,
    address: String,
}

#[async_trait]
impl DeviceTransport for AdbExecTransport {
    async fn shell(&mut self, command: &str) -> DevlinkResult<String> {
        run(&self.binary, &["-s", &self.address, "shell", command]).await
    }

    async fn push(&mut self, local: &Path, remote: &str) -> DevlinkResult<()> {
        let local = local.display().to_string();
        run(&self.binary, &["-s", &self.address, "push", &local, remote]).await?;
        Ok(())
    }

    async fn install(&mut self, package: &Path) -> DevlinkResult<()> {
        let package = package.display().to_string();
        let output = run(&self.binary, &["-s", &self.address, "install", "-r", &package]).await?;
        require_marker(&output, "install")
    }

    async fn uninstall(&mut self, package_name: &str) -> DevlinkResult<()> {
        let output = run(&self.binary, &["-s", &self.address, "uninstall", package_name]).await?;
        require_marker(&output, "uninstall")
    }

    async fn close(&mut self) -> DevlinkResult<()> {
        run(&self.binary, &["disconnect", &self.address]).await?;
        Ok(())
    }
}

/// Run the tool and return its combined output.
async fn run(binary: &Path, args: &[&str]) -> DevlinkResult<String> {
    let output = Command::new(binary)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(DevlinkError::Io)?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(DevlinkError::protocol(format!(
            "{} exited with {}: {}",
            args.join(" "),
            output.status,
            combined.trim()
        )));
    }

    Ok(combined)
}

/// Install/uninstall report failure in their output with a zero exit on
/// some tool versions, so the success marker is checked explicitly.
fn require_marker(output: &str, action: &str) -> DevlinkResult<()> {
    if output.contains("Success") {
        Ok(())
    } else {
        Err(DevlinkError::protocol(format!(
            "{} failed: {}",
            action,
            output.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_marker_accepts_success() {
        assert!(require_marker("Performing Streamed Install\nSuccess\n", "install").is_ok());
    }

    #[test]
    fn test_require_marker_rejects_failure_text() {
        let err = require_marker(
            "Failure [INSTALL_FAILED_VERSION_DOWNGRADE]",
            "install",
        )
        .unwrap_err();
        assert!(err.to_string().contains("INSTALL_FAILED_VERSION_DOWNGRADE"));
    }
}
