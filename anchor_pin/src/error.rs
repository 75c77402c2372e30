use anchor_core::Hash;

/// Failures of the pin set codec.
#[derive(thiserror::Error, Debug)]
pub enum PinSetError {
    #[error("pin set node {hash} is corrupt: {reason}")]
    Corrupt { hash: Hash, reason: String },
    #[error("pin root has no link named '{0}'")]
    MissingLink(String),
    /// A node could not be read or written; surfaced as the DAG reported it.
    #[error(transparent)]
    Dag(anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum PinError {
    #[error("not pinned")]
    NotPinned,
    #[error("{0} already pinned recursively")]
    AlreadyPinnedRecursively(Hash),
    #[error("{0} is pinned recursively")]
    PinnedRecursively(Hash),
    #[error("{key} is pinned indirectly under {root}")]
    PinnedIndirectly { key: Hash, root: Hash },
    #[error("{0} is an internal pin and cannot be unpinned")]
    InternalPin(Hash),
    #[error("{0} belongs to the pin record and cannot be pinned recursively")]
    RecordNode(Hash),
    #[error("invalid type '{0}', must be one of {{direct, indirect, recursive, internal, all}}")]
    InvalidMode(String),
    #[error("cannot load pin state: no pin root recorded")]
    NoPinState,
    #[error("cannot load pin state: {0}")]
    CorruptRecord(String),
    /// The target, or something reachable from it, could not be fetched.
    #[error(transparent)]
    Fetch(anyhow::Error),
    #[error(transparent)]
    Codec(#[from] PinSetError),
    #[error(transparent)]
    Store(anyhow::Error),
}

impl PinError {
    /// True for errors that only say "this is not pinned the way you asked",
    /// as opposed to storage or encoding failures.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            PinError::AlreadyPinnedRecursively(_)
                | PinError::PinnedRecursively(_)
                | PinError::PinnedIndirectly { .. }
                | PinError::InternalPin(_)
                | PinError::RecordNode(_)
        )
    }
}
