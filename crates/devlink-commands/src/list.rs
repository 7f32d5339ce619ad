//! List orchestrator
//!
//! Queries the device for third-party packages and their metadata. One
//! bad package must not block the rest of the list: per-package metadata
//! failures are logged and the package dropped from the result.

use std::sync::Arc;

use devlink_core::error::DevlinkResult;
use devlink_core::types::AppInfo;
use devlink_session::DeviceSession;

/// Listing of installed third-party packages
pub const LIST_PACKAGES_COMMAND: &str = "pm list packages -3";

const PACKAGE_LINE_MARKER: &str = "package:";
const VERSION_NAME_KEY: &str = "versionName=";
const VERSION_CODE_KEY: &str = "versionCode=";
const DEFAULT_VERSION_NAME: &str = "Unknown";
const DEFAULT_VERSION_CODE: &str = "0";

/// Lists installed third-party apps on the connected device
pub struct ListOrchestrator {
    session: Arc<DeviceSession>,
}

impl ListOrchestrator {
    pub fn new(session: Arc<DeviceSession>) -> Self {
        Self { session }
    }

    /// List third-party apps with their version metadata. A device with
    /// no third-party packages yields an empty list, not an error.
    pub async fn list_apps(&self) -> DevlinkResult<Vec<AppInfo>> {
        self.session.ensure_connected()?;

        tracing::info!("Fetching app list");
        let output = self.session.execute(LIST_PACKAGES_COMMAND).await?;

        let packages = parse_package_list(&output);
        tracing::info!("Found {} third-party packages", packages.len());
        if packages.is_empty() {
            return Ok(Vec::new());
        }

        let mut apps = Vec::with_capacity(packages.len());
        for package in &packages {
            if let Some(info) = self.fetch_app_info(package).await {
                apps.push(info);
            }
        }

        tracing::info!("Loaded metadata for {} of {} apps", apps.len(), packages.len());
        Ok(apps)
    }

    async fn fetch_app_info(&self, package: &str) -> Option<AppInfo> {
        match self
            .session
            .execute(&format!("dumpsys package {}", package))
            .await
        {
            Ok(dump) => Some(parse_app_info(package, &dump)),
            Err(e) => {
                tracing::warn!("Skipping {}: metadata fetch failed: {}", package, e);
                None
            }
        }
    }
}

fn parse_package_list(output: &str) -> Vec<String> {
    let mut packages = Vec::new();
    for line in output.lines() {
        let Some(rest) = line.strip_prefix(PACKAGE_LINE_MARKER) else {
            continue;
        };
        let name = rest.trim();
        if name.is_empty() {
            tracing::warn!("Empty package name in line: '{}'", line);
            continue;
        }
        packages.push(name.to_string());
    }
    packages
}

fn parse_app_info(package: &str, dump: &str) -> AppInfo {
    AppInfo {
        package_name: package.to_string(),
        app_name: package.to_string(),
        version_name: extract_value(dump, VERSION_NAME_KEY)
            .unwrap_or_else(|| DEFAULT_VERSION_NAME.to_string()),
        version_code: extract_value(dump, VERSION_CODE_KEY)
            .unwrap_or_else(|| DEFAULT_VERSION_CODE.to_string()),
    }
}

/// First occurrence of `key` across the dump, rest of that line trimmed.
fn extract_value(dump: &str, key: &str) -> Option<String> {
    dump.lines().find_map(|line| {
        let idx = line.find(key)?;
        Some(line[idx + key.len()..].trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_core::transport::{MockDialer, MockScript};
    use devlink_session::IdentityManager;

    fn disconnected_session(script: &MockScript) -> Arc<DeviceSession> {
        Arc::new(DeviceSession::new(
            Arc::new(MockDialer::new(script.clone())),
            IdentityManager::ephemeral(),
        ))
    }

    async fn connected_session(script: &MockScript) -> Arc<DeviceSession> {
        let session = disconnected_session(script);
        session.connect_default("test-device").await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_list_requires_connection() {
        let script = MockScript::new();
        let orchestrator = ListOrchestrator::new(disconnected_session(&script));

        let err = orchestrator.list_apps().await.unwrap_err();
        assert!(matches!(err, devlink_core::DevlinkError::NotConnected));
        assert_eq!(script.call_count(), 0);
    }

    #[tokio::test]
    async fn test_list_empty_device_is_success() {
        let script = MockScript::new();
        script.reply(LIST_PACKAGES_COMMAND, "");
        let orchestrator = ListOrchestrator::new(connected_session(&script).await);

        let apps = orchestrator.list_apps().await.unwrap();
        assert!(apps.is_empty());
    }

    #[tokio::test]
    async fn test_list_parses_versions() {
        let script = MockScript::new();
        script.reply(LIST_PACKAGES_COMMAND, "package:com.example.one\n");
        script.reply(
            "dumpsys package com.example.one",
            "Packages:\n  Package [com.example.one]\n    versionCode=42\n    versionName=1.2.3\n",
        );
        let orchestrator = ListOrchestrator::new(connected_session(&script).await);

        let apps = orchestrator.list_apps().await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].package_name, "com.example.one");
        assert_eq!(apps[0].version_name, "1.2.3");
        assert_eq!(apps[0].version_code, "42");
    }

    #[tokio::test]
    async fn test_list_tolerates_per_package_failures() {
        let script = MockScript::new();
        script.reply(
            LIST_PACKAGES_COMMAND,
            "package:com.example.good\npackage:com.example.bad\n",
        );
        script.reply(
            "dumpsys package com.example.good",
            "versionName=2.0\nversionCode=7\n",
        );
        script.fail_command("dumpsys package com.example.bad", "dumpsys crashed");
        let orchestrator = ListOrchestrator::new(connected_session(&script).await);

        let apps = orchestrator.list_apps().await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].package_name, "com.example.good");
    }

    #[tokio::test]
    async fn test_list_defaults_unparsable_versions() {
        let script = MockScript::new();
        script.reply(LIST_PACKAGES_COMMAND, "package:com.example.bare\n");
        script.reply("dumpsys package com.example.bare", "no version info here\n");
        let orchestrator = ListOrchestrator::new(connected_session(&script).await);

        let apps = orchestrator.list_apps().await.unwrap();
        assert_eq!(apps[0].version_name, "Unknown");
        assert_eq!(apps[0].version_code, "0");
    }

    #[test]
    fn test_parse_package_list_skips_malformed_lines() {
        let output = "package:com.example.app\ngarbage line\npackage:   \npackage:com.other\n";
        let packages = parse_package_list(output);
        assert_eq!(packages, vec!["com.example.app", "com.other"]);
    }

    #[test]
    fn test_extract_value_takes_first_occurrence() {
        let dump = "versionName=1.0\nversionName=2.0\n";
        assert_eq!(extract_value(dump, "versionName="), Some("1.0".to_string()));
    }
}
