//! Operation instrumentation
//!
//! The one place that couples start/success/failure logging, shared
//! error-state publication, and result propagation. Every orchestration
//! call site runs through [`instrumented`] instead of ad hoc handling.

use std::future::Future;

use devlink_core::error::DevlinkResult;

/// Receives the failure message of an instrumented operation
pub trait ErrorSink: Send + Sync {
    fn record_failure(&self, message: String);
}

impl<F> ErrorSink for F
where
    F: Fn(String) + Send + Sync,
{
    fn record_failure(&self, message: String) {
        self(message)
    }
}

/// Run `operation`, logging its lifecycle under `component`/`description`
/// and forwarding any failure message into `sink` before returning it.
pub async fn instrumented<T, Fut>(
    sink: &dyn ErrorSink,
    component: &str,
    description: &str,
    operation: Fut,
) -> DevlinkResult<T>
where
    Fut: Future<Output = DevlinkResult<T>>,
{
    tracing::info!("{}: {} - starting", component, description);
    match operation.await {
        Ok(value) => {
            tracing::info!("{}: {} - success", component, description);
            Ok(value)
        }
        Err(e) => {
            tracing::error!("{}: {} - failed: {}", component, description, e);
            sink.record_failure(e.to_string());
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionWatch;
    use devlink_core::error::DevlinkError;
    use devlink_core::types::ConnectionStatus;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let watch = ConnectionWatch::new();
        let result = instrumented(&watch, "test", "noop", async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(watch.current().status, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_failure_publishes_error_state() {
        let watch = ConnectionWatch::new();
        let result: DevlinkResult<()> = instrumented(&watch, "test", "probe device", async {
            Err(DevlinkError::protocol("device went away"))
        })
        .await;

        assert!(result.is_err());
        let state = watch.current();
        assert_eq!(state.status, ConnectionStatus::Error);
        assert_eq!(
            state.error_message.as_deref(),
            Some("protocol error: device went away")
        );
    }

    #[tokio::test]
    async fn test_closure_sink() {
        let seen: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let sink = |message: String| {
            seen.lock().unwrap().push(message);
        };

        let result: DevlinkResult<()> = instrumented(&sink, "test", "fail", async {
            Err(DevlinkError::NotConnected)
        })
        .await;

        assert!(result.is_err());
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["not connected to device".to_string()]
        );
    }
}
