use bytes::Bytes;
use minicbor::{Decode, Encode};
use std::convert::Infallible;
use std::sync::OnceLock;

use crate::Hash;

#[derive(thiserror::Error, Debug)]
pub enum NodeError {
    #[error("failed to decode node {hash}: {source}")]
    Decode {
        hash: Hash,
        #[source]
        source: minicbor::decode::Error,
    },
    #[error("failed to encode node: {0}")]
    Encode(#[from] minicbor::encode::Error<Infallible>),
    #[error("node has no link named '{0}'")]
    MissingLink(String),
}

/// A named, content-addressed edge from one node to another.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
#[cbor(array)]
pub struct Link {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub hash: Hash,
}

impl Link {
    pub fn new(name: impl Into<String>, hash: Hash) -> Self {
        Self {
            name: name.into(),
            hash,
        }
    }

    /// An unnamed link, used for positional entries.
    pub fn unnamed(hash: Hash) -> Self {
        Self::new(String::new(), hash)
    }
}

/// An immutable DAG node: an opaque payload plus ordered links.
///
/// A node's identifier is the BLAKE3 hash of its CBOR encoding, so a link
/// can only ever point at a node that already existed when the link was
/// made. Graphs built from nodes are acyclic by construction.
#[derive(Encode, Decode, Clone, Debug, Default, PartialEq, Eq)]
#[cbor(array)]
pub struct Node {
    #[n(0)]
    pub links: Vec<Link>,
    #[n(1)]
    #[cbor(with = "minicbor::bytes")]
    data: Vec<u8>,
}

static EMPTY_NODE_HASH: OnceLock<Hash> = OnceLock::new();

impl Node {
    pub fn new(data: impl Into<Vec<u8>>, links: Vec<Link>) -> Self {
        Self {
            links,
            data: data.into(),
        }
    }

    /// A node carrying only data.
    pub fn leaf(data: impl Into<Vec<u8>>) -> Self {
        Self::new(data, Vec::new())
    }

    /// Identifier of the canonical empty node (no links, no data).
    pub fn empty_hash() -> Hash {
        *EMPTY_NODE_HASH.get_or_init(|| {
            Node::default()
                .hash()
                .expect("encoding the empty node cannot fail")
        })
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn add_link(&mut self, name: impl Into<String>, hash: Hash) {
        self.links.push(Link::new(name, hash));
    }

    /// Returns the target of the first link with the given name.
    pub fn link(&self, name: &str) -> Result<Hash, NodeError> {
        self.links
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.hash)
            .ok_or_else(|| NodeError::MissingLink(name.to_owned()))
    }

    /// Encodes this node to its canonical CBOR bytes.
    pub fn to_bytes(&self) -> Result<Bytes, NodeError> {
        Ok(minicbor::to_vec(self)?.into())
    }

    /// Identifier of this node.
    pub fn hash(&self) -> Result<Hash, NodeError> {
        Ok(Hash::new(self.to_bytes()?))
    }

    /// Decodes a node that was stored under `hash`.
    pub fn from_bytes(hash: Hash, bytes: &[u8]) -> Result<Self, NodeError> {
        minicbor::decode(bytes).map_err(|source| NodeError::Decode { hash, source })
    }
}
