use std::sync::Arc;

use blob_core::Key;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Grants mutually exclusive access per `(bucket, ref)` key.
///
/// Entries are garbage-collected as soon as a key has no holder and no
/// waiter: the registry only ever holds as many slots as there are keys
/// currently contended, not one per key ever seen. Fairness across distinct
/// keys is automatic since each key's mutex is independent; within one key,
/// fairness follows `tokio::sync::Mutex`'s FIFO wake order.
#[derive(Debug, Default)]
pub struct KeyLockRegistry {
    locks: DashMap<Key, Arc<Mutex<()>>>,
}

impl KeyLockRegistry {
    pub fn new() -> Self {
        KeyLockRegistry {
            locks: DashMap::new(),
        }
    }

    /// Suspends the caller until `key` is free, then holds it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, key: Key) -> KeyLockGuard<'_> {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.clone().lock_owned().await;
        KeyLockGuard {
            registry: self,
            key,
            lock,
            guard: Some(guard),
        }
    }
}

pub struct KeyLockGuard<'a> {
    registry: &'a KeyLockRegistry,
    key: Key,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex before inspecting the refcount below.
        self.guard = None;

        // Drop our own reference to the slot so the strong count reflects
        // only the registry's copy plus any other concurrent waiter.
        let slot = std::mem::replace(&mut self.lock, Arc::new(Mutex::new(())));
        drop(slot);

        self.registry
            .locks
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blob_core::{Bucket, Reference};
    use std::time::Duration;

    fn key(b: &str) -> Key {
        Key::new(
            Bucket::parse(b).unwrap(),
            Reference::parse("aa0000000000000000000000000000000000000000000000000000000000000a")
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let registry = KeyLockRegistry::new();
        let _a = registry.acquire(key("b1")).await;
        let b = tokio::time::timeout(Duration::from_millis(50), registry.acquire(key("b2"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn same_key_serializes_and_releases() {
        let registry = Arc::new(KeyLockRegistry::new());
        let guard = registry.acquire(key("b1")).await;

        let registry2 = registry.clone();
        let waiter = tokio::spawn(async move {
            let _g = registry2.acquire(key("b1")).await;
        });

        // The waiter can't complete while the first guard is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn entry_is_gc_d_once_uncontended() {
        let registry = KeyLockRegistry::new();
        {
            let _guard = registry.acquire(key("b1")).await;
        }
        assert!(registry.locks.is_empty());
    }
}
