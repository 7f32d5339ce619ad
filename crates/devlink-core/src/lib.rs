//! devlink-core: Shared types and abstractions for devlink
//!
//! This crate provides the domain types, error taxonomy, configuration
//! structures, and the transport trait seam used by the session and
//! command layers.

pub mod config;
pub mod error;
pub mod format;
pub mod transport;
pub mod types;

pub use error::{DevlinkError, DevlinkResult};
pub use types::{AppInfo, ConnectionState, ConnectionStatus, DeviceAddress};
