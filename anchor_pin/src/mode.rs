use std::fmt;
use std::str::FromStr;

use anchor_core::Hash;

use crate::PinError;

/// How an identifier is retained.
///
/// Only `Recursive` and `Direct` are stored as user pins. `Internal` marks
/// the nodes of the pin record itself and `Indirect` is derived on demand
/// from the recursive roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinMode {
    Recursive,
    Direct,
    Internal,
    Indirect,
    NotPinned,
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PinMode::Recursive => "recursive",
            PinMode::Direct => "direct",
            PinMode::Internal => "internal",
            PinMode::Indirect => "indirect",
            PinMode::NotPinned => "not pinned",
        })
    }
}

/// Which classifications a pin lookup considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PinQuery {
    /// Recursive, then direct, then internal, then indirect.
    #[default]
    All,
    Direct,
    Recursive,
    Internal,
    Indirect,
}

impl PinQuery {
    pub const ALL: [PinQuery; 5] = [
        PinQuery::All,
        PinQuery::Direct,
        PinQuery::Recursive,
        PinQuery::Internal,
        PinQuery::Indirect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PinQuery::All => "all",
            PinQuery::Direct => "direct",
            PinQuery::Recursive => "recursive",
            PinQuery::Internal => "internal",
            PinQuery::Indirect => "indirect",
        }
    }
}

impl fmt::Display for PinQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinQuery {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PinQuery::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| PinError::InvalidMode(s.to_owned()))
    }
}

/// The reason an identifier is retained, as answered by a pin lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pinned {
    Recursive,
    Direct,
    Internal,
    /// Reachable from the recursive pin `root`.
    Indirect { root: Hash },
}

impl Pinned {
    pub fn mode(&self) -> PinMode {
        match self {
            Pinned::Recursive => PinMode::Recursive,
            Pinned::Direct => PinMode::Direct,
            Pinned::Internal => PinMode::Internal,
            Pinned::Indirect { .. } => PinMode::Indirect,
        }
    }
}

impl fmt::Display for Pinned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pinned::Indirect { root } => write!(f, "indirect through {root}"),
            other => fmt::Display::fmt(&other.mode(), f),
        }
    }
}
