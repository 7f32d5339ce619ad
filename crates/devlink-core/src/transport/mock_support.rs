//! Scriptable in-memory transport for test suites
//!
//! `MockScript` is the shared recording surface: every transport dialed
//! from the same script logs into it, so a test can inspect traffic after
//! the session has taken ownership of the transport. Unscripted `echo`
//! commands echo their argument back, which keeps liveness probes working
//! without per-test setup.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{DeviceTransport, TransportCredential, TransportDialer};
use crate::error::{DevlinkError, DevlinkResult};

/// Shared script and recording state for mock transports
#[derive(Clone, Default)]
pub struct MockScript {
    inner: Arc<Mutex<ScriptInner>>,
}

#[derive(Default)]
struct ScriptInner {
    replies: HashMap<String, String>,
    failing_commands: HashMap<String, String>,
    fail_install: Option<String>,
    fail_uninstall: Option<String>,
    fail_push: Option<String>,
    shell_log: Vec<String>,
    installed: Vec<PathBuf>,
    uninstalled: Vec<String>,
    pushed: Vec<(PathBuf, String)>,
    close_count: u32,
}

impl MockScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned reply for an exact shell command.
    pub fn reply(&self, command: impl Into<String>, output: impl Into<String>) {
        self.lock().replies.insert(command.into(), output.into());
    }

    /// Make an exact shell command fail with the given message.
    pub fn fail_command(&self, command: impl Into<String>, message: impl Into<String>) {
        self.lock()
            .failing_commands
            .insert(command.into(), message.into());
    }

    /// Make every `install` call fail with the given message.
    pub fn fail_install(&self, message: impl Into<String>) {
        self.lock().fail_install = Some(message.into());
    }

    /// Make every `uninstall` call fail with the given message.
    pub fn fail_uninstall(&self, message: impl Into<String>) {
        self.lock().fail_uninstall = Some(message.into());
    }

    /// Make every `push` call fail with the given message.
    pub fn fail_push(&self, message: impl Into<String>) {
        self.lock().fail_push = Some(message.into());
    }

    /// Every shell command issued so far, in order.
    pub fn shell_log(&self) -> Vec<String> {
        self.lock().shell_log.clone()
    }

    /// Package files handed to `install` so far.
    pub fn installed(&self) -> Vec<PathBuf> {
        self.lock().installed.clone()
    }

    /// Package names handed to `uninstall` so far.
    pub fn uninstalled(&self) -> Vec<String> {
        self.lock().uninstalled.clone()
    }

    /// Files handed to `push` so far.
    pub fn pushed(&self) -> Vec<(PathBuf, String)> {
        self.lock().pushed.clone()
    }

    /// Number of transports closed so far.
    pub fn close_count(&self) -> u32 {
        self.lock().close_count
    }

    /// Total transport calls of any kind issued so far.
    pub fn call_count(&self) -> usize {
        let inner = self.lock();
        inner.shell_log.len()
            + inner.installed.len()
            + inner.uninstalled.len()
            + inner.pushed.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptInner> {
        self.inner.lock().expect("mock script state poisoned")
    }
}

/// One dialed connection recording into a [`MockScript`]
pub struct MockTransport {
    script: MockScript,
}

impl MockTransport {
    pub fn new(script: MockScript) -> Self {
        Self { script }
    }
}

#[async_trait]
impl DeviceTransport for MockTransport {
    async fn shell(&mut self, command: &str) -> DevlinkResult<String> {
        let mut inner = self.script.lock();
        inner.shell_log.push(command.to_string());
        if let Some(message) = inner.failing_commands.get(command) {
            return Err(DevlinkError::protocol(message.clone()));
        }
        if let Some(reply) = inner.replies.get(command) {
            return Ok(reply.clone());
        }
        if let Some(rest) = command.strip_prefix("echo ") {
            return Ok(rest.to_string());
        }
        Ok(String::new())
    }

    async fn push(&mut self, local: &Path, remote: &str) -> DevlinkResult<()> {
        let mut inner = self.script.lock();
        if let Some(message) = inner.fail_push.clone() {
            return Err(DevlinkError::protocol(message));
        }
        inner.pushed.push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }

    async fn install(&mut self, package: &Path) -> DevlinkResult<()> {
        let mut inner = self.script.lock();
        if let Some(message) = inner.fail_install.clone() {
            return Err(DevlinkError::protocol(message));
        }
        inner.installed.push(package.to_path_buf());
        Ok(())
    }

    async fn uninstall(&mut self, package_name: &str) -> DevlinkResult<()> {
        let mut inner = self.script.lock();
        if let Some(message) = inner.fail_uninstall.clone() {
            return Err(DevlinkError::protocol(message));
        }
        inner.uninstalled.push(package_name.to_string());
        Ok(())
    }

    async fn close(&mut self) -> DevlinkResult<()> {
        self.script.lock().close_count += 1;
        Ok(())
    }
}

/// Dialer producing [`MockTransport`]s, with optional delay or failure
pub struct MockDialer {
    script: MockScript,
    dial_delay: Option<Duration>,
    fail_message: Option<String>,
    dial_count: AtomicU32,
}

impl MockDialer {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            dial_delay: None,
            fail_message: None,
            dial_count: AtomicU32::new(0),
        }
    }

    /// Delay every dial attempt, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.dial_delay = Some(delay);
        self
    }

    /// Make every dial attempt fail.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.fail_message = Some(message.into());
        self
    }

    /// Number of dial attempts made so far.
    pub fn dial_count(&self) -> u32 {
        self.dial_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportDialer for MockDialer {
    async fn dial(
        &self,
        _host: &str,
        _port: u16,
        _credential: &TransportCredential,
    ) -> DevlinkResult<Box<dyn DeviceTransport>> {
        self.dial_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.dial_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_message {
            return Err(DevlinkError::protocol(message.clone()));
        }
        Ok(Box::new(MockTransport::new(self.script.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_echo_round_trips() {
        let script = MockScript::new();
        let mut transport = MockTransport::new(script.clone());
        let out = transport.shell("echo hello").await.unwrap();
        assert_eq!(out, "hello");
        assert_eq!(script.shell_log(), vec!["echo hello".to_string()]);
    }

    #[tokio::test]
    async fn test_scripted_reply_wins() {
        let script = MockScript::new();
        script.reply("echo hello", "scripted");
        let mut transport = MockTransport::new(script);
        let out = transport.shell("echo hello").await.unwrap();
        assert_eq!(out, "scripted");
    }

    #[tokio::test]
    async fn test_failing_command() {
        let script = MockScript::new();
        script.fail_command("pm list packages -3", "device went away");
        let mut transport = MockTransport::new(script);
        let err = transport.shell("pm list packages -3").await.unwrap_err();
        assert!(matches!(err, DevlinkError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_dialer_records_attempts_and_closes() {
        let script = MockScript::new();
        let dialer = MockDialer::new(script.clone());
        let credential = TransportCredential {
            public_key: "00".to_string(),
        };
        let mut transport = dialer.dial("dev", 5555, &credential).await.unwrap();
        transport.close().await.unwrap();
        assert_eq!(dialer.dial_count(), 1);
        assert_eq!(script.close_count(), 1);
    }
}
