//! Pending call table
//!
//! Tracks outstanding correlated requests. Each entry is removed exactly once:
//! by the matching response, by closure of the connection, or when the
//! caller's [`PendingCall`] goes away (deadline elapsed or future dropped).

use super::error::GatewayError;
use super::protocol::ResponseFrame;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::trace;

/// Terminal outcome of a correlated call
pub type CallOutcome = Result<Value, GatewayError>;

/// Outstanding calls keyed by correlation id
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: Mutex<HashMap<String, oneshot::Sender<CallOutcome>>>,
}

impl PendingCalls {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<CallOutcome>>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new outstanding call under `id`
    pub fn register(self: &Arc<Self>, id: String) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id.clone(), tx);
        PendingCall {
            id,
            rx,
            table: Arc::clone(self),
        }
    }

    /// Complete the call matching `frame.id`
    ///
    /// Returns false when no call with that id is outstanding; the frame is
    /// then dropped without any other effect.
    pub fn resolve(&self, frame: ResponseFrame) -> bool {
        let Some(tx) = self.lock().remove(&frame.id) else {
            trace!(id = %frame.id, "Dropping response with no pending call");
            return false;
        };
        let _ = tx.send(frame.into_result());
        true
    }

    /// Fail every outstanding call with `error`, returning how many were failed
    pub fn fail_all(&self, error: GatewayError) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    /// Forget the call with `id` without completing it
    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Number of outstanding calls
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no call is outstanding
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Caller-side handle of one outstanding call
///
/// Dropping the handle unregisters the call.
#[derive(Debug)]
pub struct PendingCall {
    id: String,
    rx: oneshot::Receiver<CallOutcome>,
    table: Arc<PendingCalls>,
}

impl PendingCall {
    /// Correlation id of this call
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the outcome, failing with a timeout after `deadline`
    pub async fn wait(mut self, method: &str, deadline: Duration) -> CallOutcome {
        match tokio::time::timeout(deadline, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(GatewayError::ConnectionClosed),
            Err(_) => Err(GatewayError::Timeout {
                method: method.to_string(),
                secs: deadline.as_secs(),
            }),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.table.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok_frame(id: &str, payload: Value) -> ResponseFrame {
        ResponseFrame {
            id: id.to_string(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_out_of_order() {
        let table = Arc::new(PendingCalls::new());
        let first = table.register("a".to_string());
        let second = table.register("b".to_string());
        assert_eq!(table.len(), 2);

        assert!(table.resolve(ok_frame("b", json!("second"))));
        assert!(table.resolve(ok_frame("a", json!("first"))));

        let timeout = Duration::from_secs(15);
        assert_eq!(second.wait("m", timeout).await.unwrap(), json!("second"));
        assert_eq!(first.wait("m", timeout).await.unwrap(), json!("first"));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_ignored() {
        let table = Arc::new(PendingCalls::new());
        let _call = table.register("known".to_string());
        assert!(!table.resolve(ok_frame("unknown", json!(null))));
        assert_eq!(table.len(), 1);
        assert!(table.resolve(ok_frame("known", json!(null))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry_and_late_response_is_ignored() {
        let table = Arc::new(PendingCalls::new());
        let call = table.register("slow".to_string());

        let result = call.wait("cron.list", Duration::from_secs(15)).await;
        assert_eq!(
            result.unwrap_err(),
            GatewayError::Timeout {
                method: "cron.list".to_string(),
                secs: 15
            }
        );
        assert!(table.is_empty());
        assert!(!table.resolve(ok_frame("slow", json!(1))));
    }

    #[tokio::test]
    async fn test_fail_all_rejects_everything() {
        let table = Arc::new(PendingCalls::new());
        let calls: Vec<_> = (0..3)
            .map(|i| table.register(format!("call-{}", i)))
            .collect();

        assert_eq!(table.fail_all(GatewayError::ConnectionClosed), 3);
        assert!(table.is_empty());

        for call in calls {
            let result = call.wait("health", Duration::from_secs(15)).await;
            assert_eq!(result.unwrap_err(), GatewayError::ConnectionClosed);
        }
    }

    #[test]
    fn test_dropping_handle_unregisters() {
        let table = Arc::new(PendingCalls::new());
        let call = table.register("abandoned".to_string());
        assert_eq!(call.id(), "abandoned");
        drop(call);
        assert!(table.is_empty());
    }
}
