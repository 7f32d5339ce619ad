//! Reactive connection-state container
//!
//! A single-writer, multi-reader container over the connection lifecycle.
//! Each transition replaces the whole snapshot; observers see the latest
//! value only, with no queued history.

use tokio::sync::watch;

use devlink_core::types::{ConnectionState, ConnectionStatus};

use crate::instrument::ErrorSink;

/// Publishes [`ConnectionState`] snapshots to any number of observers
pub struct ConnectionWatch {
    tx: watch::Sender<ConnectionState>,
}

impl ConnectionWatch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::disconnected());
        Self { tx }
    }

    /// Subscribe to state transitions. The receiver immediately observes
    /// the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// The current snapshot.
    pub fn current(&self) -> ConnectionState {
        self.tx.borrow().clone()
    }

    pub fn set_connecting(&self) {
        self.tx.send_replace(ConnectionState::connecting());
    }

    pub fn set_connected(&self, address: impl Into<String>) {
        self.tx.send_replace(ConnectionState::connected(address));
    }

    pub fn set_disconnected(&self) {
        self.tx.send_replace(ConnectionState::disconnected());
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.tx.send_replace(ConnectionState::error(message));
    }

    /// Reset to disconnected, but only from the error state; any other
    /// state is left untouched.
    pub fn clear_error(&self) {
        if self.tx.borrow().status == ConnectionStatus::Error {
            self.tx.send_replace(ConnectionState::disconnected());
        }
    }
}

impl Default for ConnectionWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink for ConnectionWatch {
    fn record_failure(&self, message: String) {
        self.set_error(message);
    }
}
