//! Install orchestrator
//!
//! Transfers and installs a package file in one step, reporting progress
//! through a channel of [`TransferProgress`] snapshots. No byte-level
//! progress exists for the atomic transfer, so only pre/post events are
//! emitted, always in order `Transferring -> {Completed, Error}`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use devlink_core::error::{DevlinkError, DevlinkResult};
use devlink_core::types::{TransferProgress, TransferState};
use devlink_session::DeviceSession;

use crate::cache;

/// Channel carrying progress snapshots to the caller
pub type ProgressSender = mpsc::UnboundedSender<TransferProgress>;

/// Installs package files on the connected device
pub struct InstallOrchestrator {
    session: Arc<DeviceSession>,
}

impl InstallOrchestrator {
    pub fn new(session: Arc<DeviceSession>) -> Self {
        Self { session }
    }

    /// Install `package` on the device.
    ///
    /// Every outcome, including the short-circuit validations, emits a
    /// progress event; the remote cache sweep runs after every attempt
    /// and can never override the install's own result.
    pub async fn install(&self, package: &Path, progress: &ProgressSender) -> DevlinkResult<()> {
        tracing::info!("Starting package install: {}", package.display());

        let total_bytes = std::fs::metadata(package).map(|m| m.len()).unwrap_or(0);

        if let Err(e) = self.session.ensure_connected() {
            emit(progress, error_event(total_bytes, e.to_string()));
            return Err(e);
        }

        if !package.is_file() {
            let e = DevlinkError::validation(format!(
                "package file not found: {}",
                package.display()
            ));
            tracing::error!("{}", e);
            emit(progress, error_event(total_bytes, e.to_string()));
            return Err(e);
        }

        emit(
            progress,
            TransferProgress {
                state: TransferState::Transferring,
                bytes_transferred: 0,
                total_bytes,
                speed: 0,
                estimated_seconds_remaining: 0,
                error_message: None,
            },
        );

        let started = Instant::now();
        let result = self.session.install_package(package).await;

        if !cache::clean_remote_cache(&self.session).await {
            tracing::warn!("Remote package cache sweep failed after install");
        }

        match result {
            Ok(()) => {
                let elapsed = started.elapsed();
                let speed = if elapsed.as_secs() > 0 {
                    total_bytes / elapsed.as_secs()
                } else {
                    total_bytes
                };
                emit(
                    progress,
                    TransferProgress {
                        state: TransferState::Completed,
                        bytes_transferred: total_bytes,
                        total_bytes,
                        speed,
                        estimated_seconds_remaining: 0,
                        error_message: None,
                    },
                );
                tracing::info!("Package install successful");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Package install failed: {}", e);
                emit(progress, error_event(total_bytes, e.to_string()));
                Err(e)
            }
        }
    }
}

fn error_event(total_bytes: u64, message: String) -> TransferProgress {
    TransferProgress {
        state: TransferState::Error,
        bytes_transferred: 0,
        total_bytes,
        speed: 0,
        estimated_seconds_remaining: 0,
        error_message: Some(message),
    }
}

/// The receiver may be gone when the caller stopped listening; progress
/// is advisory, so a closed channel is not an error.
fn emit(progress: &ProgressSender, event: TransferProgress) {
    let _ = progress.send(event);
}
