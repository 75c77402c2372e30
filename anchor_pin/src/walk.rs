//! Reachability search used to classify indirect pins.

use std::collections::HashSet;

use anchor_core::{DagService, Hash};

use crate::{PinError, PinResult};

/// Returns true if `child` is a strict descendant of `root`.
///
/// Depth-first over links, fetching each node through `dag`. Graphs are
/// acyclic, so `seen` only saves refetching shared subtrees. A node that
/// cannot be fetched fails the search.
pub async fn has_child(dag: &dyn DagService, root: Hash, child: Hash) -> PinResult<bool> {
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(hash) = stack.pop() {
        let node = dag.get(hash).await.map_err(PinError::Fetch)?;
        for link in node.links.iter().rev() {
            if link.hash == child {
                return Ok(true);
            }
            if seen.insert(link.hash) {
                stack.push(link.hash);
            }
        }
    }
    Ok(false)
}

/// First root in `roots` (in iteration order) under which `key` is
/// reachable.
pub async fn find_indirect_root<'a, I>(
    dag: &dyn DagService,
    roots: I,
    key: Hash,
) -> PinResult<Option<Hash>>
where
    I: IntoIterator<Item = &'a Hash>,
{
    for root in roots {
        if has_child(dag, *root, key).await? {
            return Ok(Some(*root));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_core::testutil::{build_tree, leaf};
    use anchor_core::{BlockDag, BlockStore};
    use anchor_store_memory::MemoryStore;

    fn dag() -> BlockDag {
        BlockDag::new(BlockStore::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn finds_deep_descendants_only() {
        let dag = dag();
        let a = leaf(&dag, "a").await.unwrap();
        let b = build_tree(&dag, "b", &[a]).await.unwrap();
        let c = build_tree(&dag, "c", &[b]).await.unwrap();
        let other = leaf(&dag, "other").await.unwrap();

        assert!(has_child(&dag, c, a).await.unwrap());
        assert!(has_child(&dag, c, b).await.unwrap());
        assert!(!has_child(&dag, c, c).await.unwrap(), "a root is not its own child");
        assert!(!has_child(&dag, c, other).await.unwrap());
    }

    #[tokio::test]
    async fn reports_first_matching_root() {
        let dag = dag();
        let a = leaf(&dag, "a").await.unwrap();
        let x = build_tree(&dag, "x", &[]).await.unwrap();
        let y = build_tree(&dag, "y", &[a]).await.unwrap();
        let z = build_tree(&dag, "z", &[a]).await.unwrap();

        let found = find_indirect_root(&dag, &[x, y, z], a).await.unwrap();
        assert_eq!(found, Some(y));
        let none = find_indirect_root(&dag, &[x], a).await.unwrap();
        assert_eq!(none, None);
    }

    #[tokio::test]
    async fn missing_node_fails_the_search() {
        let dag = dag();
        let a = leaf(&dag, "a").await.unwrap();
        let b = build_tree(&dag, "b", &[a]).await.unwrap();
        dag.remove(a).await.unwrap();
        let needle = Hash::new(b"needle");
        let err = has_child(&dag, b, needle).await.unwrap_err();
        assert!(matches!(err, PinError::Fetch(_)));
    }
}
