use anchor_core::store::{PutResponse, StoreError, StoreFeatures, StoreResult};
use bytes::Bytes;
use dashmap::DashMap;
use futures::stream::{self, Stream};

use std::io;

#[derive(Debug)]
pub struct MemoryStore {
    files: DashMap<String, Bytes>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }

    /// Number of objects currently held.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl anchor_core::store::Store for MemoryStore {
    fn features(&self) -> StoreFeatures {
        StoreFeatures {
            case_sensitive: true,
            recommended_max_dir_size: u64::MAX,
        }
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.files.contains_key(path))
    }

    async fn put_bytes(&self, path: &str, bytes: Bytes) -> StoreResult<PutResponse> {
        self.files.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn open_read_bytes(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> StoreResult<Bytes> {
        let file = self.files.get(path).ok_or(StoreError::NotFound)?;
        let file_len = file.len();
        let start = offset as usize;

        if start >= file_len {
            return Ok(Bytes::new());
        }

        let remaining = file_len - start;
        let len = match max_len {
            Some(max) => std::cmp::min(remaining, max as usize),
            None => remaining,
        };

        Ok(file.slice(start..start + len))
    }

    async fn size(&self, path: &str) -> StoreResult<u64> {
        let file = self.files.get(path).ok_or(StoreError::NotFound)?;
        Ok(file.len() as u64)
    }

    async fn list(
        &self,
    ) -> StoreResult<Box<dyn Stream<Item = Result<String, io::Error>> + Send + Unpin + 'static>>
    {
        let keys: Vec<Result<String, io::Error>> = self
            .files
            .iter()
            .map(|entry| Ok(entry.key().clone()))
            .collect();
        Ok(Box::new(stream::iter(keys)))
    }

    /// Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.files.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_core::testutil::StoreTests;
    use anchor_core::{BlockDag, BlockStore, DagService, Node};

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        StoreTests::new(&store).run_all().await.unwrap();
    }

    #[tokio::test]
    async fn block_dag_over_memory() {
        let dag = BlockDag::new(BlockStore::new(MemoryStore::new()));
        let child = dag.add(&Node::leaf(b"child".to_vec())).await.unwrap();
        let mut parent = Node::leaf(b"parent".to_vec());
        parent.add_link("c", child);
        let root = dag.add(&parent).await.unwrap();

        assert_eq!(dag.get(root).await.unwrap(), parent);
        dag.fetch_graph(root).await.unwrap();

        dag.remove(child).await.unwrap();
        // removing twice is not an error
        dag.remove(child).await.unwrap();
        assert!(!dag.has(child).await.unwrap());

        let err = dag.fetch_graph(root).await.unwrap_err();
        assert!(format!("{err:#}").contains(&child.to_string()));
    }
}
