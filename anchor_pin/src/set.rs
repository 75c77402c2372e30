//! Sharded multiset encoding for pin sets.
//!
//! A pin set maps identifiers to positive counts. Small sets are a single
//! leaf node; larger ones are split into `fanout` buckets by a seeded hash
//! of the identifier, one tree level per split, until every leaf holds at
//! most `max_items` entries.
//!
//! Leaf node: header `{version, fanout: 0, seed, counts}` in `data` and one
//! unnamed link per entry, in ascending identifier order, so `counts[i]`
//! belongs to `links[i]`. Leaves link straight at the pinned content.
//!
//! Internal node: header `{version, fanout, seed, counts: []}` and exactly
//! `fanout` bucket links. Empty buckets point at the canonical empty node.

use std::collections::{BTreeMap, HashMap, HashSet};

use anchor_core::{DagService, Hash, Link, Node};
use minicbor::{Decode, Encode};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::error::PinSetError;

pub const DEFAULT_FANOUT: u32 = 256;
pub const DEFAULT_MAX_ITEMS: usize = 8192;

/// Deepest level at which a bucket may still be split. Past this a bucket
/// is written as one (possibly oversized) leaf.
pub const MAX_SET_DEPTH: u32 = 8;

const SET_VERSION: u8 = 1;

/// Identifier to multiplicity.
pub type Multiset = HashMap<Hash, u64>;

#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
#[cbor(map)]
struct SetHeader {
    #[n(0)]
    version: u8,
    #[n(1)]
    fanout: u32,
    #[n(2)]
    seed: u32,
    #[n(3)]
    counts: Vec<u64>,
}

enum Frame {
    /// Store `entries` (sorted, distinct) as a subtree at `depth`.
    Build {
        entries: Vec<(Hash, u64)>,
        depth: u32,
    },
    /// The top `fanout` results are the buckets of an internal node.
    Assemble { depth: u32 },
}

/// Encoder/decoder for pin sets. Cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSetCodec {
    fanout: u32,
    max_items: usize,
}

impl Default for PinSetCodec {
    fn default() -> Self {
        Self::new(DEFAULT_FANOUT, DEFAULT_MAX_ITEMS)
    }
}

impl PinSetCodec {
    /// # Panics
    /// Panics if `fanout < 2` or `max_items == 0`; neither would ever
    /// shrink a bucket.
    pub fn new(fanout: u32, max_items: usize) -> Self {
        assert!(fanout >= 2, "pin set fanout must be at least 2, got {fanout}");
        assert!(max_items > 0, "pin set max_items must be positive");
        Self { fanout, max_items }
    }

    pub fn fanout(&self) -> u32 {
        self.fanout
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    fn bucket(&self, hash: &Hash, seed: u32) -> usize {
        (xxh3_64_with_seed(hash.as_bytes(), seed as u64) % self.fanout as u64) as usize
    }

    /// Writes `entries` as a pin set and returns the identifier of its top
    /// node.
    ///
    /// Duplicate identifiers have their counts summed; zero counts are
    /// dropped. The result depends only on the resulting mapping, never on
    /// iteration order. `record` sees the identifier of every node the set
    /// is made of, including reused ones such as the empty node.
    pub async fn encode<I, F>(
        &self,
        dag: &dyn DagService,
        entries: I,
        record: &mut F,
    ) -> Result<Hash, PinSetError>
    where
        I: IntoIterator<Item = (Hash, u64)>,
        F: FnMut(Hash) + Send,
    {
        let mut merged: BTreeMap<Hash, u64> = BTreeMap::new();
        for (hash, count) in entries {
            if count == 0 {
                continue;
            }
            let slot = merged.entry(hash).or_default();
            *slot = slot.saturating_add(count);
        }
        let total = merged.len();

        let empty = Node::empty_hash();
        let mut empty_written = false;
        let mut nodes_written = 0usize;
        let mut results: Vec<Hash> = Vec::new();
        let mut stack = vec![Frame::Build {
            entries: merged.into_iter().collect(),
            depth: 0,
        }];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Build { entries, .. } if entries.is_empty() => {
                    if !empty_written {
                        dag.add(&Node::default()).await.map_err(PinSetError::Dag)?;
                        empty_written = true;
                    }
                    record(empty);
                    results.push(empty);
                }
                Frame::Build { entries, depth }
                    if entries.len() <= self.max_items || depth >= MAX_SET_DEPTH =>
                {
                    let node = leaf_node(&entries, depth)?;
                    let hash = dag.add(&node).await.map_err(PinSetError::Dag)?;
                    nodes_written += 1;
                    record(hash);
                    results.push(hash);
                }
                Frame::Build { entries, depth } => {
                    let mut buckets: Vec<Vec<(Hash, u64)>> =
                        (0..self.fanout).map(|_| Vec::new()).collect();
                    for (hash, count) in entries {
                        buckets[self.bucket(&hash, depth)].push((hash, count));
                    }
                    stack.push(Frame::Assemble { depth });
                    // Reversed so bucket 0 is built first and results come
                    // back in bucket order.
                    for bucket in buckets.into_iter().rev() {
                        stack.push(Frame::Build {
                            entries: bucket,
                            depth: depth + 1,
                        });
                    }
                }
                Frame::Assemble { depth } => {
                    let start = results.len() - self.fanout as usize;
                    let links = results.split_off(start);
                    let node = internal_node(links, self.fanout, depth)?;
                    let hash = dag.add(&node).await.map_err(PinSetError::Dag)?;
                    nodes_written += 1;
                    record(hash);
                    results.push(hash);
                }
            }
        }

        let root = results.pop().ok_or_else(|| PinSetError::Corrupt {
            hash: empty,
            reason: "encoder produced no root".to_owned(),
        })?;
        debug!(
            entries = total,
            nodes = nodes_written,
            root = %root.fmt_short(),
            "stored pin set"
        );
        Ok(root)
    }

    /// Reads the pin set linked from `root` under `link_name`.
    pub async fn decode<F>(
        &self,
        dag: &dyn DagService,
        root: &Node,
        link_name: &str,
        record: &mut F,
    ) -> Result<Multiset, PinSetError>
    where
        F: FnMut(Hash) + Send,
    {
        let top = root
            .link(link_name)
            .map_err(|_| PinSetError::MissingLink(link_name.to_owned()))?;
        self.decode_from(dag, top, record).await
    }

    /// Reads the pin set whose top node is `top`.
    ///
    /// `record` sees every node identifier visited. A node that cannot be
    /// fetched fails the whole decode; retrying is the DAG's business.
    pub async fn decode_from<F>(
        &self,
        dag: &dyn DagService,
        top: Hash,
        record: &mut F,
    ) -> Result<Multiset, PinSetError>
    where
        F: FnMut(Hash) + Send,
    {
        let empty = Node::empty_hash();
        let mut out = Multiset::new();
        let mut stack = vec![top];

        while let Some(hash) = stack.pop() {
            record(hash);
            if hash == empty {
                continue;
            }
            let node = dag.get(hash).await.map_err(PinSetError::Dag)?;
            if node.is_empty() {
                continue;
            }
            let header: SetHeader =
                minicbor::decode(node.data()).map_err(|e| PinSetError::Corrupt {
                    hash,
                    reason: format!("bad header: {e}"),
                })?;
            if header.version != SET_VERSION {
                return Err(PinSetError::Corrupt {
                    hash,
                    reason: format!("unsupported version {}", header.version),
                });
            }

            if header.fanout == 0 {
                if header.counts.len() != node.links.len() {
                    return Err(PinSetError::Corrupt {
                        hash,
                        reason: format!(
                            "{} counts for {} entries",
                            header.counts.len(),
                            node.links.len()
                        ),
                    });
                }
                for (link, count) in node.links.iter().zip(header.counts) {
                    if count == 0 {
                        continue;
                    }
                    let slot = out.entry(link.hash).or_default();
                    *slot = slot.saturating_add(count);
                }
            } else {
                if node.links.len() != header.fanout as usize || !header.counts.is_empty() {
                    return Err(PinSetError::Corrupt {
                        hash,
                        reason: format!(
                            "internal node with fanout {} has {} links and {} counts",
                            header.fanout,
                            node.links.len(),
                            header.counts.len()
                        ),
                    });
                }
                stack.extend(node.links.iter().rev().map(|l| l.hash));
            }
        }

        Ok(out)
    }

    /// Stores a plain set (every count is 1).
    pub async fn store_set<I, F>(
        &self,
        dag: &dyn DagService,
        keys: I,
        record: &mut F,
    ) -> Result<Hash, PinSetError>
    where
        I: IntoIterator<Item = Hash>,
        F: FnMut(Hash) + Send,
    {
        self.encode(dag, keys.into_iter().map(|k| (k, 1)), record)
            .await
    }

    /// Reads a set stored with [`store_set`](Self::store_set). Counts are
    /// ignored.
    pub async fn load_set<F>(
        &self,
        dag: &dyn DagService,
        root: &Node,
        link_name: &str,
        record: &mut F,
    ) -> Result<HashSet<Hash>, PinSetError>
    where
        F: FnMut(Hash) + Send,
    {
        let multiset = self.decode(dag, root, link_name, record).await?;
        Ok(multiset.into_keys().collect())
    }
}

fn leaf_node(entries: &[(Hash, u64)], depth: u32) -> Result<Node, PinSetError> {
    let header = SetHeader {
        version: SET_VERSION,
        fanout: 0,
        seed: depth,
        counts: entries.iter().map(|(_, c)| *c).collect(),
    };
    let links = entries.iter().map(|(h, _)| Link::unnamed(*h)).collect();
    Ok(Node::new(encode_header(&header)?, links))
}

fn internal_node(buckets: Vec<Hash>, fanout: u32, depth: u32) -> Result<Node, PinSetError> {
    let header = SetHeader {
        version: SET_VERSION,
        fanout,
        seed: depth,
        counts: Vec::new(),
    };
    let links = buckets.into_iter().map(Link::unnamed).collect();
    Ok(Node::new(encode_header(&header)?, links))
}

fn encode_header(header: &SetHeader) -> Result<Vec<u8>, PinSetError> {
    minicbor::to_vec(header)
        .map_err(|e| PinSetError::Dag(anyhow::anyhow!("encoding pin set header: {e}")))
}
