//! Uninstall orchestrator

use std::sync::Arc;

use devlink_core::error::{DevlinkError, DevlinkResult};
use devlink_session::DeviceSession;

/// Confirmation returned on successful removal
pub const UNINSTALL_CONFIRMATION: &str = "Uninstall successful";

/// Removes installed packages from the connected device
pub struct UninstallOrchestrator {
    session: Arc<DeviceSession>,
}

impl UninstallOrchestrator {
    pub fn new(session: Arc<DeviceSession>) -> Self {
        Self { session }
    }

    /// Remove `package_name` from the device, returning a fixed
    /// confirmation string on success.
    pub async fn uninstall(&self, package_name: &str) -> DevlinkResult<String> {
        self.session.ensure_connected()?;

        if package_name.trim().is_empty() {
            return Err(DevlinkError::validation("package name cannot be empty"));
        }

        tracing::info!("Starting app uninstall: {}", package_name);
        match self.session.uninstall_package(package_name).await {
            Ok(()) => {
                tracing::info!("App uninstall successful: {}", package_name);
                Ok(UNINSTALL_CONFIRMATION.to_string())
            }
            Err(e) => {
                tracing::error!("App uninstall failed: {}", e);
                Err(e)
            }
        }
    }
}
