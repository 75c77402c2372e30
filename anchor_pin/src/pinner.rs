use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anchor_core::{DagService, Datastore, Hash, Node};
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::PinnerConfig;
use crate::mode::{PinMode, PinQuery, Pinned};
use crate::set::PinSetCodec;
use crate::walk::find_indirect_root;
use crate::{PinError, PinResult};

/// Datastore key holding the identifier of the current pin root.
pub const PIN_ROOT_KEY: &str = "/local/pins";
/// Root node link to the direct pin set.
pub const LINK_DIRECT: &str = "direct";
/// Root node link to the recursive pin set.
pub const LINK_RECURSIVE: &str = "recursive";

#[derive(Debug, Default)]
struct PinState {
    recursive: HashSet<Hash>,
    direct: HashSet<Hash>,
    /// Nodes of the current persisted record, root included.
    internal: HashSet<Hash>,
    root: Option<Hash>,
}

impl PinState {
    fn sorted_recursive(&self) -> Vec<Hash> {
        let mut roots: Vec<Hash> = self.recursive.iter().copied().collect();
        roots.sort();
        roots
    }
}

/// A consistent copy of the pin sets, each sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinSnapshot {
    pub recursive: Vec<Hash>,
    pub direct: Vec<Hash>,
    pub internal: Vec<Hash>,
}

/// Authoritative record of which identifiers must be retained.
///
/// All state sits behind one `RwLock`. Queries take it shared; every
/// mutation, including the DAG fetches done by [`pin`](Self::pin), holds it
/// exclusively for the whole call, so observers never see a half-applied
/// change. Nothing is durable until [`flush`](Self::flush).
#[derive(Debug)]
pub struct Pinner {
    state: RwLock<PinState>,
    dag: Arc<dyn DagService>,
    datastore: Arc<dyn Datastore>,
    codec: PinSetCodec,
    load_timeout: Duration,
}

impl Pinner {
    /// An empty pinner for a fresh store.
    pub fn new(dag: Arc<dyn DagService>, datastore: Arc<dyn Datastore>) -> Self {
        Self::with_config(dag, datastore, &PinnerConfig::default())
    }

    pub fn with_config(
        dag: Arc<dyn DagService>,
        datastore: Arc<dyn Datastore>,
        config: &PinnerConfig,
    ) -> Self {
        Self {
            state: RwLock::new(PinState::default()),
            dag,
            datastore,
            codec: config.codec(),
            load_timeout: config.load_timeout(),
        }
    }

    /// Restores the state written by the last [`flush`](Self::flush).
    ///
    /// Fails with [`PinError::NoPinState`] if nothing was ever flushed and
    /// with [`PinError::CorruptRecord`] if the record cannot be read back
    /// within the configured load timeout.
    pub async fn load(
        dag: Arc<dyn DagService>,
        datastore: Arc<dyn Datastore>,
        config: &PinnerConfig,
    ) -> PinResult<Self> {
        let pinner = Self::with_config(dag, datastore, config);
        let raw = pinner
            .datastore
            .get(PIN_ROOT_KEY)
            .await
            .map_err(PinError::Store)?
            .ok_or(PinError::NoPinState)?;
        let root = Hash::from_slice(&raw)
            .map_err(|e| PinError::CorruptRecord(format!("malformed pin root: {e}")))?;

        let state = tokio::time::timeout(pinner.load_timeout, pinner.read_record(root))
            .await
            .map_err(|_| {
                PinError::CorruptRecord(format!(
                    "timed out after {:?} reading pin root {root}",
                    pinner.load_timeout
                ))
            })??;

        info!(
            root = %root.fmt_short(),
            recursive = state.recursive.len(),
            direct = state.direct.len(),
            internal = state.internal.len(),
            "loaded pin state"
        );
        *pinner.state.write().await = state;
        Ok(pinner)
    }

    /// Like [`load`](Self::load), but starts empty when no record exists.
    pub async fn open(
        dag: Arc<dyn DagService>,
        datastore: Arc<dyn Datastore>,
        config: &PinnerConfig,
    ) -> PinResult<Self> {
        match Self::load(dag.clone(), datastore.clone(), config).await {
            Err(PinError::NoPinState) => {
                info!("no pin state recorded, starting empty");
                Ok(Self::with_config(dag, datastore, config))
            }
            other => other,
        }
    }

    async fn read_record(&self, root: Hash) -> PinResult<PinState> {
        let node = self.dag.get(root).await.map_err(|e| {
            PinError::CorruptRecord(format!("cannot find pinning root object: {e:#}"))
        })?;

        let mut internal = HashSet::new();
        internal.insert(root);
        let mut record = |hash: Hash| {
            internal.insert(hash);
        };
        let recursive = self
            .codec
            .load_set(self.dag.as_ref(), &node, LINK_RECURSIVE, &mut record)
            .await
            .map_err(|e| PinError::CorruptRecord(format!("cannot load recursive pins: {e:#}")))?;
        let direct = self
            .codec
            .load_set(self.dag.as_ref(), &node, LINK_DIRECT, &mut record)
            .await
            .map_err(|e| PinError::CorruptRecord(format!("cannot load direct pins: {e:#}")))?;

        Ok(PinState {
            recursive,
            direct,
            internal,
            root: Some(root),
        })
    }

    pub fn dag(&self) -> &Arc<dyn DagService> {
        &self.dag
    }

    /// Identifier of the last flushed or loaded root node.
    pub async fn root(&self) -> Option<Hash> {
        self.state.read().await.root
    }

    /// Pins `target`.
    ///
    /// A recursive pin first fetches the whole graph under `target` and
    /// fails, leaving the state untouched, if any node is unavailable. It
    /// replaces a direct pin on the same target. A direct pin only needs
    /// the target itself and is refused for recursively pinned targets.
    /// Nodes of the current pin record cannot be pinned recursively.
    pub async fn pin(&self, target: Hash, recursive: bool) -> PinResult<()> {
        let mut state = self.state.write().await;

        if recursive {
            if state.recursive.contains(&target) {
                return Ok(());
            }
            // Record nodes are removed once a later flush replaces them.
            // The empty node is exempt since flush never removes it.
            if target != Node::empty_hash() && state.internal.contains(&target) {
                return Err(PinError::RecordNode(target));
            }
            self.dag
                .fetch_graph(target)
                .await
                .map_err(PinError::Fetch)?;
            if state.direct.remove(&target) {
                debug!(%target, "upgrading direct pin to recursive");
            }
            state.recursive.insert(target);
        } else {
            if state.recursive.contains(&target) {
                return Err(PinError::AlreadyPinnedRecursively(target));
            }
            self.dag.get(target).await.map_err(PinError::Fetch)?;
            state.direct.insert(target);
        }

        debug!(%target, recursive, "pinned");
        Ok(())
    }

    /// Stores `node` and pins it.
    pub async fn pin_node(&self, node: &Node, recursive: bool) -> PinResult<Hash> {
        let hash = self.dag.add(node).await.map_err(PinError::Store)?;
        self.pin(hash, recursive).await?;
        Ok(hash)
    }

    /// Removes the pin on `target`.
    ///
    /// Recursive pins are only removed when `recursive` is set. Targets that
    /// are only reachable from another recursive pin, or that belong to the
    /// pin record itself, cannot be unpinned.
    pub async fn unpin(&self, target: Hash, recursive: bool) -> PinResult<()> {
        let mut state = self.state.write().await;

        match self.classify(&state, target, PinQuery::All).await? {
            None => Err(PinError::NotPinned),
            Some(Pinned::Recursive) if recursive => {
                state.recursive.remove(&target);
                debug!(%target, "unpinned recursive");
                Ok(())
            }
            Some(Pinned::Recursive) => Err(PinError::PinnedRecursively(target)),
            Some(Pinned::Direct) => {
                state.direct.remove(&target);
                debug!(%target, "unpinned direct");
                Ok(())
            }
            Some(Pinned::Internal) => Err(PinError::InternalPin(target)),
            Some(Pinned::Indirect { root }) => Err(PinError::PinnedIndirectly { key: target, root }),
        }
    }

    /// Whether `key` is retained for any reason, and which.
    pub async fn is_pinned(&self, key: Hash) -> PinResult<Option<Pinned>> {
        self.is_pinned_with_type(key, PinQuery::All).await
    }

    /// Whether `key` is retained in the way `query` asks about.
    ///
    /// [`PinQuery::All`] checks recursive, direct and internal membership
    /// before walking the recursive roots for an indirect match.
    pub async fn is_pinned_with_type(&self, key: Hash, query: PinQuery) -> PinResult<Option<Pinned>> {
        let state = self.state.read().await;
        self.classify(&state, key, query).await
    }

    async fn classify(
        &self,
        state: &PinState,
        key: Hash,
        query: PinQuery,
    ) -> PinResult<Option<Pinned>> {
        let any = query == PinQuery::All;

        if (any || query == PinQuery::Recursive) && state.recursive.contains(&key) {
            return Ok(Some(Pinned::Recursive));
        }
        if query == PinQuery::Recursive {
            return Ok(None);
        }

        if (any || query == PinQuery::Direct) && state.direct.contains(&key) {
            return Ok(Some(Pinned::Direct));
        }
        if query == PinQuery::Direct {
            return Ok(None);
        }

        if (any || query == PinQuery::Internal) && state.internal.contains(&key) {
            return Ok(Some(Pinned::Internal));
        }
        if query == PinQuery::Internal {
            return Ok(None);
        }

        let roots = state.sorted_recursive();
        let root = find_indirect_root(self.dag.as_ref(), &roots, key).await?;
        Ok(root.map(|root| Pinned::Indirect { root }))
    }

    /// Adds `key` to a set without any of the checks [`pin`](Self::pin)
    /// makes. The caller is responsible for the graph being present and for
    /// not pinning the same key both ways.
    ///
    /// # Panics
    /// Panics for any mode other than `Recursive` or `Direct`.
    pub async fn pin_with_mode(&self, key: Hash, mode: PinMode) {
        let mut state = self.state.write().await;
        match mode {
            PinMode::Recursive => state.recursive.insert(key),
            PinMode::Direct => state.direct.insert(key),
            other => panic!("unrecognized pin mode: {other}"),
        };
    }

    /// Removes `key` from a set without any of the checks
    /// [`unpin`](Self::unpin) makes.
    ///
    /// # Panics
    /// Panics for any mode other than `Recursive` or `Direct`.
    pub async fn remove_pin_with_mode(&self, key: Hash, mode: PinMode) {
        let mut state = self.state.write().await;
        match mode {
            PinMode::Recursive => state.recursive.remove(&key),
            PinMode::Direct => state.direct.remove(&key),
            other => panic!("unrecognized pin mode: {other}"),
        };
    }

    pub async fn direct_keys(&self) -> Vec<Hash> {
        let mut keys: Vec<Hash> = self.state.read().await.direct.iter().copied().collect();
        keys.sort();
        keys
    }

    pub async fn recursive_keys(&self) -> Vec<Hash> {
        self.state.read().await.sorted_recursive()
    }

    /// Recursive, direct and internal keys read under one lock, so a pin
    /// change cannot land between them.
    pub async fn snapshot(&self) -> PinSnapshot {
        let state = self.state.read().await;
        let mut direct: Vec<Hash> = state.direct.iter().copied().collect();
        direct.sort();
        let mut internal: Vec<Hash> = state.internal.iter().copied().collect();
        internal.sort();
        PinSnapshot {
            recursive: state.sorted_recursive(),
            direct,
            internal,
        }
    }

    /// Nodes making up the current pin record. Empty until the first flush
    /// or load.
    pub async fn internal_pins(&self) -> Vec<Hash> {
        let state = self.state.write().await;
        let mut keys: Vec<Hash> = state.internal.iter().copied().collect();
        keys.sort();
        keys
    }

    /// Writes both pin sets and a new root node, records the root as the
    /// current one, then removes nodes only the previous record used.
    ///
    /// The root pointer is the last thing written, so a failure before it
    /// leaves the previous record in force.
    pub async fn flush(&self) -> PinResult<Hash> {
        let mut state = self.state.write().await;
        let dag = self.dag.as_ref();

        let mut internal = HashSet::new();
        let mut record = |hash: Hash| {
            internal.insert(hash);
        };
        let direct = self
            .codec
            .store_set(dag, state.direct.iter().copied(), &mut record)
            .await?;
        let recursive = self
            .codec
            .store_set(dag, state.recursive.iter().copied(), &mut record)
            .await?;

        let mut node = Node::default();
        node.add_link(LINK_DIRECT, direct);
        node.add_link(LINK_RECURSIVE, recursive);
        let root = dag.add(&node).await.map_err(PinError::Store)?;
        internal.insert(root);

        self.datastore
            .put(PIN_ROOT_KEY, Bytes::copy_from_slice(root.as_bytes()))
            .await
            .map_err(PinError::Store)?;

        // The empty node can appear in any user graph, so it is never ours
        // to remove.
        let empty = Node::empty_hash();
        let stale: Vec<Hash> = state
            .internal
            .iter()
            .filter(|h| {
                **h != empty
                    && !internal.contains(*h)
                    && !state.direct.contains(*h)
                    && !state.recursive.contains(*h)
            })
            .copied()
            .collect();
        for hash in &stale {
            if let Err(err) = dag.remove(*hash).await {
                warn!(hash = %hash.fmt_short(), "failed to remove stale pin node: {err:#}");
            }
        }

        info!(
            root = %root.fmt_short(),
            direct = state.direct.len(),
            recursive = state.recursive.len(),
            nodes = internal.len(),
            removed = stale.len(),
            "flushed pin state"
        );
        state.internal = internal;
        state.root = Some(root);
        Ok(root)
    }
}
