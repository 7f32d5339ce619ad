//! devlink-commands: Package-lifecycle orchestration
//!
//! Higher-level operations (install, uninstall, list) built on the
//! session primitives, together with the cache janitor and the shared
//! instrumentation that couples logging, error-state publication, and
//! result propagation.

pub mod cache;
pub mod install;
pub mod instrument;
pub mod list;
pub mod state;
pub mod uninstall;

pub use install::{InstallOrchestrator, ProgressSender};
pub use instrument::{instrumented, ErrorSink};
pub use list::ListOrchestrator;
pub use state::ConnectionWatch;
pub use uninstall::UninstallOrchestrator;
