//! Cache janitor
//!
//! Sweeps temporary package-archive files on both ends of the link.
//! Cleanup is best-effort everywhere: failures are logged and never
//! surface past this module.

use std::fs;
use std::path::Path;

use devlink_core::format::format_file_size;
use devlink_session::DeviceSession;

/// Listing of remote temporaries; falls back to a fixed marker when none
/// exist so the reply is unambiguous.
pub const REMOTE_CACHE_LIST: &str =
    "ls -la /data/local/tmp/*.apk 2>/dev/null || echo 'No APK files found'";
/// Marker emitted by [`REMOTE_CACHE_LIST`] when there is nothing to clean.
pub const REMOTE_CACHE_EMPTY_MARKER: &str = "No APK files found";
/// Unconditional removal of remote temporaries.
pub const REMOTE_CACHE_REMOVE: &str = "rm -f /data/local/tmp/*.apk";
/// Post-removal count of surviving temporaries.
pub const REMOTE_CACHE_VERIFY: &str = "ls /data/local/tmp/*.apk 2>/dev/null | wc -l";

const PACKAGE_SUFFIX: &str = ".apk";
const TEMP_SELECTION_MARKER: &str = "temp_selected";

/// Delete cached package files under `cache_dir`, returning how many
/// files were removed and how many bytes that freed.
///
/// A missing directory or an empty sweep is `(0, 0)`, not an error, and
/// individual deletion failures are logged and skipped.
pub fn clear_local_cache(cache_dir: &Path) -> (usize, u64) {
    let entries = match fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(_) => {
            tracing::debug!("Cache directory {} does not exist", cache_dir.display());
            return (0, 0);
        }
    };

    let mut cleaned_count = 0;
    let mut cleaned_bytes = 0u64;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.ends_with(PACKAGE_SUFFIX) || name.contains(TEMP_SELECTION_MARKER)) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(&path) {
            Ok(()) => {
                cleaned_count += 1;
                cleaned_bytes += size;
                tracing::debug!("Deleted cache file: {} ({})", name, format_file_size(size));
            }
            Err(e) => {
                tracing::error!("Failed to delete cache file {}: {}", name, e);
            }
        }
    }

    if cleaned_count > 0 {
        tracing::info!(
            "Cleaned {} cached package files, freed {}",
            cleaned_count,
            format_file_size(cleaned_bytes)
        );
    } else {
        tracing::debug!("No cached package files to clean");
    }

    (cleaned_count, cleaned_bytes)
}

/// Sweep temporary package files from the device.
///
/// Returns `false` without issuing any command when no session is live.
/// The return value reflects the removal step; the follow-up verification
/// only logs.
pub async fn clean_remote_cache(session: &DeviceSession) -> bool {
    if !session.is_connected() {
        tracing::warn!("Cannot clean remote cache: no device connected");
        return false;
    }

    let listing = match session.execute(REMOTE_CACHE_LIST).await {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Failed to list remote package files: {}", e);
            return false;
        }
    };

    if listing.contains(REMOTE_CACHE_EMPTY_MARKER) {
        tracing::info!("Remote device has no package files to clean");
        return true;
    }

    tracing::info!("Remote package files to be cleaned:\n{}", listing);

    if let Err(e) = session.execute(REMOTE_CACHE_REMOVE).await {
        tracing::warn!("Failed to run remote cleanup command: {}", e);
        return false;
    }

    match session.execute(REMOTE_CACHE_VERIFY).await {
        Ok(output) => {
            let remaining: u32 = output.trim().parse().unwrap_or(0);
            if remaining == 0 {
                tracing::info!("Remote package cache cleanup complete");
            } else {
                tracing::warn!("{} remote package files still remaining", remaining);
            }
        }
        Err(e) => {
            tracing::warn!("Remote cleanup verification failed: {}", e);
        }
    }

    true
}
