//! Shared test fixtures, enabled with the `testutil` feature.
//!
//! Backend crates run [`StoreTests`] or [`DatastoreTests`] against their
//! implementation:
//!
//! ```ignore
//! #[tokio::test]
//! async fn conforms() {
//!     let store = MyStore::new();
//!     StoreTests::new(&store).run_all().await.unwrap();
//! }
//! ```
//!
//! The DAG helpers build small graphs for pinning tests.

use crate::datastore::Datastore;
use crate::store::{Store, StoreError, StoreResult};
use crate::{DagService, Hash, Link, Node};
use bytes::Bytes;
use futures::StreamExt;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::HashSet;

/// Conformance checks every `Store` backend must pass.
///
/// All objects are written under a random prefix so the suite can run
/// against a store that already holds data; `run_all` removes them again.
pub struct StoreTests<'a, S> {
    store: &'a S,
    prefix: String,
}

impl<'a, S: Store> StoreTests<'a, S> {
    pub fn new(store: &'a S) -> Self {
        let prefix = format!("_conformance_{:08x}/", rand::rng().random::<u32>());
        Self { store, prefix }
    }

    fn path(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub async fn run_all(&self) -> StoreResult<()> {
        self.write_read_overwrite().await?;
        self.ranged_reads().await?;
        self.missing_objects().await?;
        self.deletes().await?;
        self.listing().await?;
        self.cleanup().await
    }

    /// Existence, size and contents track the last write.
    pub async fn write_read_overwrite(&self) -> StoreResult<()> {
        let path = self.path("object.bin");
        assert!(!self.store.exists(&path).await?, "{path} exists before any write");

        let first = random_bytes(12_345);
        self.store.put_bytes(&path, first.clone()).await?;
        assert!(self.store.exists(&path).await?);
        assert_eq!(self.store.size(&path).await?, 12_345);
        assert_eq!(self.store.open_read_bytes(&path, 0, None).await?, first);

        let second = Bytes::from_static(b"replacement");
        self.store.put_bytes(&path, second.clone()).await?;
        assert_eq!(self.store.open_read_bytes(&path, 0, None).await?, second);
        assert_eq!(self.store.size(&path).await?, second.len() as u64);
        Ok(())
    }

    pub async fn ranged_reads(&self) -> StoreResult<()> {
        let path = self.path("ranged.bin");
        self.store
            .put_bytes(&path, Bytes::from_static(b"0123456789abcdef"))
            .await?;

        let tail = self.store.open_read_bytes(&path, 10, None).await?;
        assert_eq!(tail.as_ref(), b"abcdef");
        let window = self.store.open_read_bytes(&path, 2, Some(3)).await?;
        assert_eq!(window.as_ref(), b"234");
        let clipped = self.store.open_read_bytes(&path, 14, Some(10)).await?;
        assert_eq!(clipped.as_ref(), b"ef");
        Ok(())
    }

    /// Reads of absent objects must fail with a not-found error.
    pub async fn missing_objects(&self) -> StoreResult<()> {
        let path = self.path("never_written.bin");
        let err = self
            .store
            .open_read_bytes(&path, 0, None)
            .await
            .expect_err("reading a missing object should fail");
        assert!(
            StoreError::is_not_found(&err),
            "missing object should report not-found, got: {err:#}"
        );
        Ok(())
    }

    pub async fn deletes(&self) -> StoreResult<()> {
        let path = self.path("doomed.bin");
        self.store
            .put_bytes(&path, Bytes::from_static(b"short lived"))
            .await?;
        self.store.delete(&path).await?;
        assert!(!self.store.exists(&path).await?, "{path} survived delete");
        Ok(())
    }

    /// Listing returns nested paths with `/` separators after normalizing.
    pub async fn listing(&self) -> StoreResult<()> {
        let wanted: HashSet<String> = ["a.bin", "b.bin", "nested/deeper/c.bin"]
            .iter()
            .map(|name| self.path(name))
            .collect();
        for path in &wanted {
            self.store.put_bytes(path, Bytes::from_static(b"x")).await?;
        }

        let mut listed = HashSet::new();
        let mut stream = self.store.list().await?;
        while let Some(item) = stream.next().await {
            listed.insert(item?.replace('\\', "/"));
        }
        for path in &wanted {
            assert!(listed.contains(path), "list is missing {path}");
        }
        Ok(())
    }

    /// Removes everything written under this suite's prefix.
    pub async fn cleanup(&self) -> StoreResult<()> {
        let mut stream = self.store.list().await?;
        let mut ours = Vec::new();
        while let Some(item) = stream.next().await {
            let path = item?;
            if path.replace('\\', "/").starts_with(&self.prefix) {
                ours.push(path);
            }
        }
        for path in ours {
            self.store.delete(&path).await?;
        }
        Ok(())
    }
}

/// Test suite for `Datastore` implementations.
pub struct DatastoreTests<'a, D> {
    datastore: &'a D,
}

impl<'a, D: Datastore> DatastoreTests<'a, D> {
    pub fn new(datastore: &'a D) -> Self {
        Self { datastore }
    }

    pub async fn run_all(&self) -> StoreResult<()> {
        let key = format!("/_test/{}", rand::rng().random::<u32>());

        assert_eq!(self.datastore.get(&key).await?, None, "fresh key is unset");

        self.datastore
            .put(&key, Bytes::from_static(b"first"))
            .await?;
        self.datastore
            .put(&key, Bytes::from_static(b"second"))
            .await?;
        let got = self.datastore.get(&key).await?;
        assert_eq!(got.as_deref(), Some(&b"second"[..]), "last put wins");

        self.datastore.delete(&key).await?;
        assert_eq!(self.datastore.get(&key).await?, None, "deleted key is unset");

        Ok(())
    }
}

/// `len` random bytes.
pub fn random_bytes(len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    rand::rng().fill(&mut data[..]);
    Bytes::from(data)
}

/// `count` distinct pseudo-random identifiers, reproducible from `seed`.
pub fn random_hashes(seed: u64, count: usize) -> Vec<Hash> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::with_capacity(count);
    while seen.len() < count {
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes);
        seen.insert(Hash::from_bytes(bytes));
    }
    let mut out: Vec<Hash> = seen.into_iter().collect();
    out.sort();
    out
}

/// Stores a data-only node and returns its identifier.
pub async fn leaf(dag: &dyn DagService, data: &str) -> StoreResult<Hash> {
    dag.add(&Node::leaf(data.as_bytes().to_vec())).await
}

/// Stores a node linking to `children` (named by position) and returns its
/// identifier.
pub async fn build_tree(dag: &dyn DagService, data: &str, children: &[Hash]) -> StoreResult<Hash> {
    let links = children
        .iter()
        .enumerate()
        .map(|(i, h)| Link::new(i.to_string(), *h))
        .collect();
    dag.add(&Node::new(data.as_bytes().to_vec(), links)).await
}
