use blob_core::Key;
use dashmap::DashMap;

/// Identifies one connection for subscription bookkeeping. Assigned by the
/// wiring layer (an `AtomicU64` counter is sufficient; uniqueness for the
/// lifetime of the process is all that's required).
pub type ConnId = u64;

/// Maps keys to the set of connections currently observing them.
///
/// `H` is whatever handle the caller needs to reach a connection again (in
/// practice, an `mpsc::UnboundedSender` for outbound protocol events). All
/// three operations are linearizable per key via `DashMap`'s internal
/// sharded locking.
#[derive(Debug)]
pub struct SubscriptionRegistry<H> {
    subs: DashMap<Key, DashMap<ConnId, H>>,
}

impl<H> Default for SubscriptionRegistry<H> {
    fn default() -> Self {
        SubscriptionRegistry {
            subs: DashMap::new(),
        }
    }
}

impl<H: Clone> SubscriptionRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, key: Key, conn: ConnId, handle: H) {
        self.subs
            .entry(key)
            .or_default()
            .insert(conn, handle);
    }

    /// Removes `conn` from `key`'s subscriber set, dropping the key entry
    /// entirely once it has no subscribers left.
    pub fn remove(&self, key: &Key, conn: ConnId) {
        if let Some(peers) = self.subs.get(key) {
            peers.remove(&conn);
        }
        self.subs.remove_if(key, |_, peers| peers.is_empty());
    }

    /// A snapshot of the handles subscribed to `key`, excluding `excluding`.
    pub fn peers(&self, key: &Key, excluding: ConnId) -> Vec<H> {
        self.subs
            .get(key)
            .map(|peers| {
                peers
                    .iter()
                    .filter(|entry| *entry.key() != excluding)
                    .map(|entry| entry.value().clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}
