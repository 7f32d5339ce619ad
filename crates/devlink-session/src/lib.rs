//! devlink-session: Identity and connection lifecycle
//!
//! Owns the device identity credential and the single live session,
//! exposing the connect/disconnect/execute primitives the command layer
//! is built on.

pub mod identity;
pub mod session;

pub use identity::{IdentityCredential, IdentityManager};
pub use session::DeviceSession;
