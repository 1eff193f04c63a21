//! Traits at the seams of the lifecycle core.
//!
//! The core executes blocks against a Merkle trie, dispatches CPU-heavy work
//! onto a pool, and reads chain parameters, but owns none of those things.
//! The host injects implementations of the traits in this crate; the core
//! never names a concrete store, trie, or runtime.

use std::sync::Arc;

use bytes::Bytes;
use fluxvm_error::Error;
use fluxvm_fixed_hash::H256;

/// Chain parameters valid at the timestamp they were fetched for.
pub trait Rules: Send + Sync {
    /// Upper bound on the number of transactions in one block.
    fn max_block_txs(&self) -> usize;

    /// Seconds, measured backward from a block's timestamp, within which
    /// transaction IDs must be unique across the ancestor chain.
    fn validity_window(&self) -> i64;

    /// Floor for the fee charged per compute unit.
    fn min_unit_price(&self) -> u64;

    /// Floor for the block production cost.
    fn min_block_cost(&self) -> u64;

    /// Consumed units per fee window at which the unit price holds steady.
    fn window_target_units(&self) -> u64;

    /// Produced blocks per fee window at which the block cost holds steady.
    fn window_target_blocks(&self) -> u64;
}

/// A state key a transaction declares it may touch, with an upper bound on
/// the trie chunks the value may occupy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateKey {
    pub key: Bytes,
    pub max_chunks: u16,
}

impl StateKey {
    pub fn new(key: Bytes, max_chunks: u16) -> Self {
        StateKey { key, max_chunks }
    }
}

/// Read-only frozen snapshot of a view's contents, safe to share across the
/// worker pool for prefetching.
pub trait StateReader: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, Error>;
}

/// A mutable overlay over the Merkle trie.
///
/// Each block being verified owns exactly one view. Forks are expected to be
/// cheap copy-on-write handles so sibling blocks can branch from the same
/// parent post-state without copying it.
pub trait StateView: Send {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, Error>;

    fn insert(&mut self, key: Bytes, value: Bytes) -> Result<(), Error>;

    fn delete(&mut self, key: &[u8]) -> Result<(), Error>;

    /// Merkle root over the view's current contents.
    fn root(&self) -> Result<H256, Error>;

    /// Frozen snapshot of the current contents for concurrent reads.
    fn reader(&self) -> Arc<dyn StateReader>;

    /// A fresh writable view layered on this one, sized for roughly
    /// `estimated_changes` key changes.
    fn fork(&self, estimated_changes: usize) -> Box<dyn StateView>;

    /// Promotes the accumulated changes into the canonical store, consuming
    /// the view.
    fn commit(self: Box<Self>) -> Result<(), Error>;
}

/// Handle to the canonical world state at the accepted tip.
pub trait State: Send + Sync {
    /// A fresh writable view over the canonical tip.
    fn view(&self, estimated_changes: usize) -> Result<Box<dyn StateView>, Error>;

    /// Merkle root of the canonical state.
    fn root(&self) -> Result<H256, Error>;
}

/// An opaque parallel job runner supplied by the host.
///
/// The core never spawns threads of its own; signature verification and
/// prefetch fan-out go through this seam.
pub trait Workers: Send + Sync {
    fn spawn(&self, task: Box<dyn FnOnce() + Send + 'static>);
}
