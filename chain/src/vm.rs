//! The host interface the lifecycle core drives.

use std::sync::Arc;

use fluxvm_error::Error;
use fluxvm_traits::{Rules, State, Workers};
use fluxvm_types::{Registry, Transaction, H256};

use crate::block::StatelessBlock;

/// Everything the lifecycle core needs from its host VM.
///
/// The VM owns the arena of in-memory blocks (keyed by ID), the canonical
/// state, the expiring map of accepted transaction IDs, and the mempool this
/// core only ever signals through the lifecycle notifications.
pub trait Vm: Send + Sync {
    /// Chain parameters valid at `timestamp`.
    fn rules(&self, timestamp: i64) -> Arc<dyn Rules>;

    /// Action and auth decode tables for the transaction codec.
    fn registry(&self) -> &Registry;

    /// The injected parallel job runner.
    fn workers(&self) -> Arc<dyn Workers>;

    /// Canonical state at the accepted tip.
    fn state(&self) -> Arc<dyn State>;

    /// Whether dynamic state sync has progressed far enough to execute
    /// blocks locally.
    fn is_state_ready(&self) -> bool;

    /// The most recently accepted block.
    fn last_accepted_block(&self) -> Arc<StatelessBlock>;

    /// Looks up an in-memory block by ID.
    fn get_stateless_block(&self, id: &H256) -> Option<Arc<StatelessBlock>>;

    /// Queries the expiring map of accepted transaction IDs for any of
    /// `txs` landing inside the validity window; returns the first hit.
    fn is_repeat(&self, txs: &[Arc<Transaction>], oldest_allowed: i64) -> Option<H256>;

    /// During state sync: whether `block` should become the new sync target
    /// instead of being executed.
    fn update_sync_target(&self, block: &StatelessBlock) -> bool;

    /// The block passed verification; the host drops its txs from the
    /// mempool.
    fn verified(&self, block: &StatelessBlock);

    /// The block was accepted; the host indexes its txs in the expiring map.
    fn accepted(&self, block: &StatelessBlock);

    /// The block was rejected. No state effects.
    fn rejected(&self, block: &StatelessBlock);

    /// Persists the new accepted tip.
    fn set_last_accepted(&self, block: &StatelessBlock) -> Result<(), Error>;
}
