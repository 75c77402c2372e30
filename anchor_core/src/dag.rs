//! Node-level access to a content-addressed block store.

use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::{BlockStore, Hash, Node, store::StoreResult};

/// Reads and writes DAG nodes by identifier.
///
/// Implementations decide where nodes come from; `fetch_graph` is how the
/// pinning layer makes sure a whole graph is locally available before it
/// promises to retain it.
#[async_trait]
pub trait DagService: std::fmt::Debug + Send + Sync {
    /// Fetches and decodes the node named by `hash`.
    async fn get(&self, hash: Hash) -> StoreResult<Node>;

    /// Stores `node` and returns its identifier.
    async fn add(&self, node: &Node) -> StoreResult<Hash>;

    /// Removes the node named by `hash`. Missing nodes are not an error.
    async fn remove(&self, hash: Hash) -> StoreResult<()>;

    async fn has(&self, hash: Hash) -> StoreResult<bool>;

    /// Ensures every node reachable from `root` (including `root`) is
    /// available, failing on the first node that cannot be fetched or
    /// decoded. Shared subtrees are only fetched once.
    async fn fetch_graph(&self, root: Hash) -> StoreResult<()> {
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(hash) = stack.pop() {
            if !seen.insert(hash) {
                continue;
            }
            let node = self
                .get(hash)
                .await
                .with_context(|| format!("fetching graph of {root}: node {hash} unavailable"))?;
            stack.extend(node.links.iter().map(|l| l.hash));
        }
        Ok(())
    }
}

/// `DagService` over a local `BlockStore`.
#[derive(Debug, Clone)]
pub struct BlockDag {
    blocks: BlockStore,
}

impl BlockDag {
    pub fn new(blocks: BlockStore) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }
}

#[async_trait]
impl DagService for BlockDag {
    async fn get(&self, hash: Hash) -> StoreResult<Node> {
        let bytes = self.blocks.get(hash).await?;
        Ok(Node::from_bytes(hash, &bytes)?)
    }

    async fn add(&self, node: &Node) -> StoreResult<Hash> {
        self.blocks.put(node.to_bytes()?).await
    }

    async fn remove(&self, hash: Hash) -> StoreResult<()> {
        match self.blocks.remove(hash).await {
            Err(err) if crate::StoreError::is_not_found(&err) => Ok(()),
            other => other,
        }
    }

    async fn has(&self, hash: Hash) -> StoreResult<bool> {
        self.blocks.has(hash).await
    }
}
