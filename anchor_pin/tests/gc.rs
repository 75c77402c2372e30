use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anchor_core::testutil::{build_tree, leaf};
use anchor_core::{BlockDag, BlockStore, DagService, Hash, MemoryDatastore, Node, StoreResult};
use anchor_pin::{Pinner, PinnerConfig, collect_retained, gc_store};
use anchor_store_memory::MemoryStore;
use tokio::sync::Notify;

/// Holds the first read of `held` until `release` is notified, once armed.
#[derive(Debug)]
struct GatedDag {
    inner: Arc<BlockDag>,
    held: Hash,
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl DagService for GatedDag {
    async fn get(&self, hash: Hash) -> StoreResult<Node> {
        if hash == self.held && self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.get(hash).await
    }

    async fn add(&self, node: &Node) -> StoreResult<Hash> {
        self.inner.add(node).await
    }

    async fn remove(&self, hash: Hash) -> StoreResult<()> {
        self.inner.remove(hash).await
    }

    async fn has(&self, hash: Hash) -> StoreResult<bool> {
        self.inner.has(hash).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn gc_keeps_pinned_graphs_and_the_pin_record() -> anyhow::Result<()> {
    let blocks = BlockStore::new(MemoryStore::new());
    let dag = Arc::new(BlockDag::new(blocks.clone()));
    let datastore = Arc::new(MemoryDatastore::new());
    let pinner = Pinner::new(dag.clone(), datastore.clone());

    let child = leaf(dag.as_ref(), "child").await?;
    let tree = build_tree(dag.as_ref(), "tree", &[child]).await?;
    let single = leaf(dag.as_ref(), "single").await?;
    let junk = leaf(dag.as_ref(), "junk").await?;
    let junk_parent = build_tree(dag.as_ref(), "junk parent", &[child]).await?;

    pinner.pin(tree, true).await?;
    pinner.pin(single, false).await?;
    let root = pinner.flush().await?;

    let retained = collect_retained(&pinner).await?;
    for hash in [tree, child, single, root] {
        assert!(retained.contains(&hash), "{hash} should be retained");
    }

    let mut expected = vec![junk, junk_parent];
    expected.sort();

    let dry = gc_store(&blocks, &retained, true).await?;
    assert_eq!(dry.candidates, expected);
    assert_eq!(dry.deleted, 0);
    assert!(dag.has(junk).await?);

    let report = gc_store(&blocks, &retained, false).await?;
    assert_eq!(report.deleted, 2);
    assert!(report.delete_errors.is_empty());
    assert_eq!(report.kept, report.total - 2);
    assert!(!dag.has(junk).await?);
    assert!(!dag.has(junk_parent).await?);
    assert!(dag.has(child).await?, "shared child is still pinned");

    let reloaded = Pinner::load(dag.clone(), datastore, &PinnerConfig::default()).await?;
    assert_eq!(reloaded.recursive_keys().await, vec![tree]);
    assert_eq!(reloaded.direct_keys().await, vec![single]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn retained_set_requires_complete_graphs() -> anyhow::Result<()> {
    let blocks = BlockStore::new(MemoryStore::new());
    let dag = Arc::new(BlockDag::new(blocks.clone()));
    let pinner = Pinner::new(dag.clone(), Arc::new(MemoryDatastore::new()));

    let child = leaf(dag.as_ref(), "child").await?;
    let tree = build_tree(dag.as_ref(), "tree", &[child]).await?;
    pinner.pin(tree, true).await?;
    dag.remove(child).await?;

    assert!(collect_retained(&pinner).await.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn upgrade_during_walk_stays_retained() -> anyhow::Result<()> {
    let inner = Arc::new(BlockDag::new(BlockStore::new(MemoryStore::new())));
    let child = leaf(inner.as_ref(), "child").await?;
    let tree = build_tree(inner.as_ref(), "tree", &[child]).await?;
    let upgraded = leaf(inner.as_ref(), "upgraded").await?;

    let dag = Arc::new(GatedDag {
        inner,
        held: tree,
        armed: AtomicBool::new(false),
        reached: Notify::new(),
        release: Notify::new(),
    });
    let pinner = Arc::new(Pinner::new(dag.clone(), Arc::new(MemoryDatastore::new())));
    pinner.pin(tree, true).await?;
    pinner.pin(upgraded, false).await?;

    dag.armed.store(true, Ordering::SeqCst);
    let collector = tokio::spawn({
        let pinner = pinner.clone();
        async move { collect_retained(&pinner).await }
    });

    // The walk is parked on `tree`; move `upgraded` from direct to recursive.
    dag.reached.notified().await;
    pinner.pin(upgraded, true).await?;
    dag.release.notify_one();

    let retained = collector.await??;
    assert_eq!(pinner.recursive_keys().await.len(), 2);
    for hash in [tree, child, upgraded] {
        assert!(retained.contains(&hash), "{hash} should be retained");
    }
    Ok(())
}
