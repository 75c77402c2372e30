use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::set::{DEFAULT_FANOUT, DEFAULT_MAX_ITEMS, PinSetCodec};

/// Tunables for a `Pinner`. Every field has a default, so an empty
/// `[pinner]` table is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PinnerConfig {
    /// Upper bound on reading the pin record during load. The record is
    /// local data, so a store that takes longer than this is treated as
    /// broken rather than slow.
    pub load_timeout_ms: u64,
    /// Buckets per internal pin set node.
    pub fanout: u32,
    /// Entries a pin set leaf may hold before it is split into buckets.
    pub max_items: usize,
}

impl Default for PinnerConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 5_000,
            fanout: DEFAULT_FANOUT,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

impl PinnerConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn codec(&self) -> PinSetCodec {
        PinSetCodec::new(self.fanout, self.max_items)
    }
}
