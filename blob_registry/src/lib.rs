//! Shared mutable state coordination: per-key locking, subscription
//! fan-out bookkeeping, and the shutdown-drain primitive.

pub mod gate;
pub mod key_lock;
pub mod subscription;

pub use gate::{DEFAULT_SHUTDOWN_TIMEOUT, ExecutionGate};
pub use key_lock::{KeyLockGuard, KeyLockRegistry};
pub use subscription::{ConnId, SubscriptionRegistry};
