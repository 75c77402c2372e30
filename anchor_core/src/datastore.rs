//! Small fixed-key records that live outside the DAG.
//!
//! The pinning layer keeps exactly one such record (the identifier of the
//! current pin root), but the trait is deliberately key-generic.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::store::StoreResult;

#[async_trait]
pub trait Datastore: std::fmt::Debug + Send + Sync {
    /// Returns the value stored under `key`, or `None` if it was never set.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Stores `value` under `key`, replacing any previous value. Once this
    /// returns `Ok`, the value must survive a crash.
    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Process-local `Datastore`, mostly useful for tests.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    records: DashMap<String, Bytes>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.records.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.records.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.records.remove(key);
        Ok(())
    }
}
