use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;

use crate::{
    Hash,
    store::{Store, StoreFeatures, StoreResult},
};

pub mod paths;

/// Content-addressed block API built on top of a generic `Store`.
///
/// `BlockStore` keeps every block under a deterministic path derived from
/// its `Hash`, so writing the same bytes twice is a no-op.
#[derive(Debug, Clone)]
pub struct BlockStore {
    store: Arc<dyn Store>,
}

impl BlockStore {
    pub fn new<S>(store: S) -> Self
    where
        S: Store + 'static,
    {
        Self {
            store: Arc::new(store),
        }
    }

    /// Create a `BlockStore` from a boxed `Store`.
    pub fn new_boxed(store: Box<dyn Store + 'static>) -> Self {
        Self {
            store: Arc::from(store),
        }
    }

    pub fn block_path_for_hash(&self, hash: Hash) -> String {
        paths::block_path_for_hash(hash, &self.store.features())
    }

    pub fn hash_from_block_path(
        path: &str,
        features: &StoreFeatures,
    ) -> Result<Option<Hash>, std::io::Error> {
        paths::hash_from_block_path(path, features)
    }

    /// Stores `bytes` and returns their hash. Existing blocks are not rewritten.
    pub async fn put(&self, bytes: Bytes) -> StoreResult<Hash> {
        let hash = Hash::new(&bytes);
        let path = self.block_path_for_hash(hash);
        if self.store.exists(&path).await? {
            tracing::trace!(%hash, "block already stored");
            return Ok(hash);
        }
        self.store.put_bytes(&path, bytes).await?;
        Ok(hash)
    }

    pub async fn get(&self, hash: Hash) -> StoreResult<Bytes> {
        self.store
            .open_read_bytes(&self.block_path_for_hash(hash), 0, None)
            .await
    }

    pub async fn has(&self, hash: Hash) -> StoreResult<bool> {
        self.store.exists(&self.block_path_for_hash(hash)).await
    }

    pub async fn size(&self, hash: Hash) -> StoreResult<u64> {
        self.store.size(&self.block_path_for_hash(hash)).await
    }

    /// Deletes a block from the store.
    pub async fn remove(&self, hash: Hash) -> StoreResult<()> {
        self.store.delete(&self.block_path_for_hash(hash)).await
    }

    /// Returns all block hashes currently stored under the `block3/` prefix.
    pub async fn list_hashes(&self) -> StoreResult<Vec<Hash>> {
        let features = self.store.features();
        let mut hashes = Vec::new();
        let mut stream = self.store.list().await?;

        while let Some(item) = stream.next().await {
            let path = item?;
            if let Some(hash) = Self::hash_from_block_path(&path, &features)? {
                hashes.push(hash);
            }
        }

        Ok(hashes)
    }
}
