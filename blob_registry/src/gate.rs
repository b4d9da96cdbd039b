use std::time::Duration;

use tokio::sync::{RwLock, RwLockReadGuard};

/// Process-wide reader/writer coordinator used to drain in-flight request
/// handlers at shutdown.
///
/// Every request handler holds the read side for its duration via
/// [`ExecutionGate::enter`]; shutdown acquires the write side via
/// [`ExecutionGate::shutdown`], which only succeeds once every handler has
/// released its read guard. The write acquisition is time-bounded: if it
/// doesn't complete before the timeout, shutdown proceeds anyway rather
/// than hanging forever behind a stuck handler.
#[derive(Debug, Default)]
pub struct ExecutionGate {
    lock: RwLock<()>,
}

/// Reference value from the specification; shutdown waits this long for
/// in-flight handlers to finish before giving up and proceeding anyway.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl ExecutionGate {
    pub fn new() -> Self {
        ExecutionGate::default()
    }

    /// Acquires the shared (reader) side for the duration of one request.
    pub async fn enter(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().await
    }

    /// Acquires the exclusive (writer) side with a timeout, guaranteeing
    /// that once it returns, either no handler is executing or the timeout
    /// elapsed.
    pub async fn shutdown(&self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.lock.write()).await {
            Ok(_guard) => tracing::info!("execution gate drained; no handlers in flight"),
            Err(_) => tracing::warn!(
                ?timeout,
                "execution gate drain timed out; shutting down anyway"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_handler_to_finish() {
        let gate = Arc::new(ExecutionGate::new());
        let guard = gate.enter().await;

        let gate2 = gate.clone();
        let shutdown = tokio::spawn(async move {
            gate2.shutdown(Duration::from_millis(200)).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!shutdown.is_finished());
        drop(guard);
        shutdown.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_times_out_rather_than_hanging_forever() {
        let gate = Arc::new(ExecutionGate::new());
        let _guard = gate.enter().await;
        let start = std::time::Instant::now();
        gate.shutdown(Duration::from_millis(30)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
