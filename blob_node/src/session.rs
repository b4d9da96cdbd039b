use blob_core::blob::{validate_data, validate_request_version};
use blob_core::{BlobRecord, Bucket, Key, Reference, ServiceError, now_ms};
use blob_registry::{ConnId, KeyLockRegistry, SubscriptionRegistry};
use blob_store::Store;
use serde_json::{Value, json};

use crate::state::PeerHandle;

/// The outcome of a `set` call: the ack payload to send immediately, and
/// the key to fan a `changed` event out to afterward, if the write
/// succeeded.
pub struct SetOutcome {
    pub ack: Value,
    pub fan_out_key: Option<Key>,
}

/// One live bearer of a bucket identity. Owned exclusively by its
/// connection task; the bucket is fixed for the session's lifetime and at
/// most one reference is subscribed to at a time.
pub struct Session {
    pub bucket: Bucket,
    pub ip: String,
    current: Option<Reference>,
}

impl Session {
    pub fn new(bucket: Bucket, ip: String) -> Self {
        Session {
            bucket,
            ip,
            current: None,
        }
    }

    /// `now(ack)` : no state change, never fails.
    pub fn now(&self) -> Value {
        json!({ "timestamp": now_ms() })
    }

    /// `ref(refOrNone, ack)` : atomically moves the session's subscription
    /// from its previous key (if any) to the new one (if any). On
    /// validation failure the prior subscription is left intact.
    pub fn set_ref(
        &mut self,
        conn_id: ConnId,
        handle: &PeerHandle,
        subs: &SubscriptionRegistry<PeerHandle>,
        raw: &str,
    ) -> Result<(), ServiceError> {
        let new_ref = if raw == "none" {
            None
        } else {
            Some(Reference::parse(raw)?)
        };

        if let Some(old) = self.current.take() {
            subs.remove(&Key::new(self.bucket.clone(), old), conn_id);
        }
        if let Some(reference) = new_ref {
            subs.add(
                Key::new(self.bucket.clone(), reference),
                conn_id,
                handle.clone(),
            );
        }
        self.current = new_ref;
        Ok(())
    }

    /// `get({known}, ack)` : requires a current reference.
    pub async fn get(
        &self,
        store: &dyn Store,
        key_locks: &KeyLockRegistry,
        known: Option<i64>,
    ) -> Result<Value, ServiceError> {
        let reference = self.current.ok_or(ServiceError::MissingReference)?;
        let key = Key::new(self.bucket.clone(), reference);

        let _guard = key_locks.acquire(key.clone()).await;
        let record = store.read(&key).await?;

        Ok(match record {
            None => Value::Null,
            Some(record) if known == Some(record.version as i64) => {
                json!({ "version": record.version })
            }
            Some(record) => json!({ "data": record.data, "version": record.version }),
        })
    }

    /// `set({data, version}, ack)` : requires a current reference.
    pub async fn set(
        &self,
        store: &dyn Store,
        key_locks: &KeyLockRegistry,
        data: String,
        version: Option<i64>,
    ) -> Result<SetOutcome, ServiceError> {
        validate_data(&data)?;
        let requested_version = validate_request_version(version)?;
        let reference = self.current.ok_or(ServiceError::MissingReference)?;
        let key = Key::new(self.bucket.clone(), reference);

        let _guard = key_locks.acquire(key.clone()).await;
        let existing = store.read(&key).await?;

        let (record, ack) = match existing {
            None => {
                let record = BlobRecord {
                    data,
                    version: 1,
                    created: now_ms(),
                    updated: None,
                    ip: self.ip.clone(),
                };
                let ack = json!({ "success": true, "version": record.version });
                (record, ack)
            }
            Some(old) if requested_version == Some(old.version) => {
                let record = BlobRecord {
                    data,
                    version: old.version + 1,
                    created: old.created,
                    updated: Some(now_ms()),
                    ip: self.ip.clone(),
                };
                let ack = json!({ "success": true, "version": record.version });
                (record, ack)
            }
            Some(old) => {
                // Conflict: do not write, do not fan out.
                return Ok(SetOutcome {
                    ack: json!({ "success": false, "data": old.data, "version": old.version }),
                    fan_out_key: None,
                });
            }
        };

        store.write(&key, &record).await?;
        Ok(SetOutcome {
            ack,
            fan_out_key: Some(key),
        })
    }

    /// `disconnect` : removes the session from the subscription registry
    /// if it was subscribed. No ack.
    pub fn disconnect(&mut self, conn_id: ConnId, subs: &SubscriptionRegistry<PeerHandle>) {
        if let Some(reference) = self.current.take() {
            subs.remove(&Key::new(self.bucket.clone(), reference), conn_id);
        }
        tracing::info!(bucket = %self.bucket, "session disconnected");
    }
}
