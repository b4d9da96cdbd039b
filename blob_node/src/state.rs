use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use blob_auth::TokenVerifier;
use blob_registry::{ConnId, ExecutionGate, KeyLockRegistry, SubscriptionRegistry};
use blob_store::Store;
use tokio::sync::mpsc;

use crate::protocol::OutboundEvent;

/// The handle a connection registers with the [`SubscriptionRegistry`] so
/// that other connections can fan a `changed` event out to it.
pub type PeerHandle = mpsc::UnboundedSender<OutboundEvent>;

/// Shared, cloneable handles to every stateful component, constructed once
/// at startup and handed to each connection task.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub key_locks: Arc<KeyLockRegistry>,
    pub subs: Arc<SubscriptionRegistry<PeerHandle>>,
    pub verifier: Arc<TokenVerifier>,
    pub gate: Arc<ExecutionGate>,
    next_conn_id: AtomicU64,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        AppState {
            store,
            key_locks: Arc::new(KeyLockRegistry::new()),
            subs: Arc::new(SubscriptionRegistry::new()),
            verifier,
            gate: Arc::new(ExecutionGate::new()),
            next_conn_id: AtomicU64::new(0),
        }
    }

    pub fn next_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }
}
