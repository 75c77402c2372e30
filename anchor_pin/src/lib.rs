//! Pin tracking for an anchor block store.
//!
//! A [`Pinner`] records which identifiers must survive garbage collection:
//! - recursive pins keep a root and everything reachable from it
//! - direct pins keep a single node
//! - internal pins are the nodes of the pin record itself
//!
//! Indirect pins (descendants of recursive roots) are never stored; they
//! are found on demand by walking the recursive roots.
//!
//! The record lives in the same DAG it protects. [`Pinner::flush`] encodes
//! the direct and recursive sets with [`PinSetCodec`], links both from a
//! new root node and stores that root's identifier in a [`Datastore`]
//! under [`PIN_ROOT_KEY`]. [`Pinner::load`] reverses this on start-up.
//!
//! [`Datastore`]: anchor_core::Datastore

pub mod config;
pub mod error;
pub mod gc;
pub mod mode;
pub mod pinner;
pub mod set;
pub mod walk;

pub use config::PinnerConfig;
pub use error::{PinError, PinSetError};
pub use gc::{GcReport, collect_retained, gc_store, reachable_from};
pub use mode::{PinMode, PinQuery, Pinned};
pub use pinner::{LINK_DIRECT, LINK_RECURSIVE, PIN_ROOT_KEY, PinSnapshot, Pinner};
pub use set::{DEFAULT_FANOUT, DEFAULT_MAX_ITEMS, MAX_SET_DEPTH, Multiset, PinSetCodec};

pub type PinResult<T> = Result<T, PinError>;
