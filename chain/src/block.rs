//! The stateless block and its lifecycle state machine.

use std::cmp;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use fluxvm_error::{Error, InternalErrorKind};
use fluxvm_fee::ExecutionContext;
use fluxvm_hash::blake2b_256;
use fluxvm_systemtime::unix_time_as_secs;
use fluxvm_traits::{Rules, StateReader, StateView};
use fluxvm_types::{Block, BlockBuilder, Transaction, TxResult, H256};

use crate::error::{BlockError, TimestampError};
use crate::processor::Processor;
use crate::signature::SignatureJob;
use crate::vm::Vm;
use crate::{interrupted, AcceptResult, ALLOWED_FUTURE_DRIFT, MAX_VERIFY_DEPTH};

/// Lifecycle status of a block.
///
/// `Accepted` and `Rejected` are terminal. `VerifiedWithoutState` is the
/// state-sync case: the block passed every check that does not require
/// state, and a later accept finishes the work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Processing,
    Verified,
    VerifiedWithoutState,
    Accepted,
    Rejected,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Accepted | Status::Rejected)
    }
}

struct Inner {
    status: Status,
    txs_set: Option<HashSet<H256>>,
    sig_job: Option<SignatureJob>,
    view: Option<Box<dyn StateView>>,
    results: Option<Vec<TxResult>>,
}

/// A block plus everything the lifecycle tracks on top of the wire form:
/// the content-addressed ID, the canonical bytes, the in-block tx-ID set,
/// the signature job, and (once verified) the post-execution trie view and
/// per-transaction results.
pub struct StatelessBlock {
    block: Block,
    id: H256,
    bytes: Bytes,
    built_locally: bool,
    inner: Mutex<Inner>,
    // Serializes concurrent verify attempts on the same block; recursion
    // only ever takes locks of strictly older blocks.
    verify_lock: Mutex<()>,
}

fn check_structure(block: &Block, rules: &dyn Rules, now: i64) -> Result<(), Error> {
    let future_bound = now + ALLOWED_FUTURE_DRIFT;
    if block.timestamp() >= future_bound {
        return Err(TimestampError::TooLate {
            max: future_bound,
            actual: block.timestamp(),
        }
        .into());
    }
    if block.txs().is_empty() {
        return Err(BlockError::NoTxs.into());
    }
    let max_txs = rules.max_block_txs();
    if block.txs().len() > max_txs {
        return Err(BlockError::TooManyTxs {
            max: max_txs,
            actual: block.txs().len(),
        }
        .into());
    }
    Ok(())
}

impl StatelessBlock {
    /// Decodes wire bytes into a block with the caller-supplied status.
    ///
    /// For non-genesis heights the cheap structural checks run here, and
    /// unless the block sits at or below the accepted tip, the in-block
    /// tx-ID set is built (failing on intra-block duplicates) and the
    /// signature job is dispatched. Blocks at or below the accepted tip are
    /// parsed for observation only and never re-verified.
    pub fn parse(
        vm: &dyn Vm,
        bytes: Bytes,
        status: Status,
        stop: &CancellationToken,
    ) -> Result<Self, Error> {
        let block = Block::unmarshal(&bytes, vm.registry())?;
        Self::from_parts(vm, block, bytes, status, false, stop)
    }

    pub(crate) fn from_parts(
        vm: &dyn Vm,
        block: Block,
        bytes: Bytes,
        status: Status,
        built_locally: bool,
        stop: &CancellationToken,
    ) -> Result<Self, Error> {
        let id = H256::from(blake2b_256(&bytes));
        if block.height() > 0 {
            let rules = vm.rules(block.timestamp());
            check_structure(&block, rules.as_ref(), unix_time_as_secs())?;
        }
        let stateless = StatelessBlock {
            id,
            bytes,
            built_locally,
            inner: Mutex::new(Inner {
                status,
                txs_set: None,
                sig_job: None,
                view: None,
                results: None,
            }),
            verify_lock: Mutex::new(()),
            block,
        };
        if stateless.block.height() > 0
            && stateless.block.height() > vm.last_accepted_block().height()
        {
            stateless.populate_txs(vm, stop)?;
        }
        Ok(stateless)
    }

    /// The genesis block: height 0, zero parent, zero windows, the minimum
    /// price and cost, and the caller-supplied state root.
    pub fn new_genesis(
        state_root: H256,
        min_unit_price: u64,
        min_block_cost: u64,
    ) -> Result<Self, Error> {
        let block = BlockBuilder::default()
            .unit_price(min_unit_price)
            .block_cost(min_block_cost)
            .state_root(state_root)
            .build();
        let bytes = block.marshal()?;
        let id = H256::from(blake2b_256(&bytes));
        Ok(StatelessBlock {
            id,
            bytes,
            built_locally: false,
            inner: Mutex::new(Inner {
                status: Status::Accepted,
                txs_set: None,
                sig_job: None,
                view: None,
                results: None,
            }),
            verify_lock: Mutex::new(()),
            block,
        })
    }

    fn populate_txs(&self, vm: &dyn Vm, stop: &CancellationToken) -> Result<(), Error> {
        if stop.is_cancelled() {
            return Err(interrupted("populate txs"));
        }
        let txs = self.block.txs();
        let mut txs_set = HashSet::with_capacity(txs.len());
        for tx in txs {
            if !txs_set.insert(*tx.id()) {
                return Err(BlockError::DuplicateTx(*tx.id()).into());
            }
        }
        let mut inner = self.inner.lock();
        inner.txs_set = Some(txs_set);
        if !self.built_locally {
            inner.sig_job = Some(SignatureJob::spawn(vm.workers().as_ref(), txs, stop));
        }
        Ok(())
    }

    pub(crate) fn attach_execution(&self, view: Box<dyn StateView>, results: Vec<TxResult>) {
        let mut inner = self.inner.lock();
        inner.view = Some(view);
        inner.results = Some(results);
    }

    pub fn id(&self) -> &H256 {
        &self.id
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn height(&self) -> u64 {
        self.block.height()
    }

    pub fn timestamp(&self) -> i64 {
        self.block.timestamp()
    }

    pub fn parent(&self) -> &H256 {
        self.block.parent()
    }

    pub fn status(&self) -> Status {
        self.inner.lock().status
    }

    /// Whether the post-execution view is present.
    pub fn is_processed(&self) -> bool {
        self.inner.lock().view.is_some()
    }

    /// The per-transaction execution results, present once processed.
    pub fn results(&self) -> Option<Vec<TxResult>> {
        self.inner.lock().results.clone()
    }

    /// Read access to this block's post-execution state.
    pub fn state_reader(&self) -> Result<Arc<dyn StateReader>, Error> {
        let inner = self.inner.lock();
        match inner.view.as_ref() {
            Some(view) => Ok(view.reader()),
            None => Err(BlockError::NotProcessed.into()),
        }
    }

    /// Verifies the block against its parent and executes it.
    ///
    /// Terminal blocks must never reach this. A block that already fully
    /// verified returns immediately; one that verified without state (sync
    /// mode) runs the whole pipeline again now that state may be available.
    pub fn verify(&self, vm: &dyn Vm, stop: &CancellationToken) -> Result<(), Error> {
        self.verify_at_depth(vm, stop, 0)
    }

    fn verify_at_depth(
        &self,
        vm: &dyn Vm,
        stop: &CancellationToken,
        depth: usize,
    ) -> Result<(), Error> {
        if depth > MAX_VERIFY_DEPTH {
            return Err(InternalErrorKind::Other
                .other("ancestor verification recursion limit reached")
                .into());
        }
        let _guard = self.verify_lock.lock();
        match self.status() {
            Status::Accepted | Status::Rejected => {
                return Err(InternalErrorKind::System
                    .other(format!("verify called on terminal block {}", self.id))
                    .into());
            }
            Status::Verified => return Ok(()),
            Status::Processing | Status::VerifiedWithoutState => {}
        }
        if stop.is_cancelled() {
            return Err(interrupted("verify"));
        }
        if self.block.is_genesis() {
            return Ok(());
        }

        let rules = vm.rules(self.block.timestamp());
        check_structure(&self.block, rules.as_ref(), unix_time_as_secs())?;

        let parent = vm
            .get_stateless_block(self.block.parent())
            .ok_or_else(|| Error::from(BlockError::UnknownParent(*self.block.parent())))?;
        if self.block.timestamp() <= parent.timestamp() {
            return Err(TimestampError::TooEarly {
                min: parent.timestamp() + 1,
                actual: self.block.timestamp(),
            }
            .into());
        }

        if !vm.is_state_ready() {
            debug!("state not ready, verifying block {} without state", self.id);
            self.inner.lock().status = Status::VerifiedWithoutState;
            return Ok(());
        }

        let oldest_allowed = cmp::max(0, self.block.timestamp() - rules.validity_window());
        if let Some(repeated) = parent.is_repeat(vm, oldest_allowed, self.block.txs(), stop)? {
            return Err(BlockError::DuplicateTx(repeated).into());
        }

        let context =
            ExecutionContext::generate(parent.block(), self.block.timestamp(), rules.as_ref());
        if self.block.unit_price() != context.next_unit_price {
            return Err(BlockError::InvalidUnitPrice {
                expected: context.next_unit_price,
                actual: self.block.unit_price(),
            }
            .into());
        }
        if self.block.unit_window() != context.next_unit_window {
            return Err(BlockError::InvalidUnitWindow.into());
        }
        if self.block.block_cost() != context.next_block_cost {
            return Err(BlockError::InvalidBlockCost {
                expected: context.next_block_cost,
                actual: self.block.block_cost(),
            }
            .into());
        }
        if self.block.block_window() != context.next_block_window {
            return Err(BlockError::InvalidBlockWindow.into());
        }

        let mut view =
            parent.child_state_at_depth(vm, 2 * self.block.txs().len(), stop, depth + 1)?;

        let processor = Processor::new(&self.block);
        processor.prefetch(vm.workers().as_ref(), view.reader(), stop)?;
        let executed = processor.execute(view.as_mut(), rules.as_ref(), stop)?;

        if executed.units_consumed != self.block.units_consumed() {
            return Err(BlockError::InvalidUnitsConsumed {
                expected: executed.units_consumed,
                actual: self.block.units_consumed(),
            }
            .into());
        }
        if executed.surplus_fee != self.block.surplus_fee() {
            return Err(BlockError::InvalidSurplus {
                expected: executed.surplus_fee,
                actual: self.block.surplus_fee(),
            }
            .into());
        }
        let required_surplus = self.block.unit_price().saturating_mul(self.block.block_cost());
        if self.block.surplus_fee() < required_surplus {
            return Err(BlockError::InsufficientSurplus {
                required: required_surplus,
                actual: self.block.surplus_fee(),
            }
            .into());
        }

        let state_root = view.root()?;
        if state_root != *self.block.state_root() {
            return Err(BlockError::StateRootMismatch {
                expected: *self.block.state_root(),
                actual: state_root,
            }
            .into());
        }

        // Parsed blocks still have signature work in flight; locally built
        // blocks had their signatures vetted at mempool admission.
        if !self.built_locally {
            let sig_job = self.inner.lock().sig_job.take();
            if let Some(job) = sig_job {
                job.wait(stop)?;
            }
        }

        {
            let mut inner = self.inner.lock();
            inner.view = Some(view);
            if inner.results.is_none() {
                inner.results = Some(executed.results);
            }
            inner.status = Status::Verified;
        }
        vm.verified(self);
        info!("verified block {}-{}", self.block.height(), self.id);
        Ok(())
    }

    /// Walks from this block toward the genesis looking for any of `txs`
    /// within the validity window; delegates to the VM's expiring map once
    /// the walk reaches accepted territory. Returns the first repeated ID.
    pub fn is_repeat(
        &self,
        vm: &dyn Vm,
        oldest_allowed: i64,
        txs: &[Arc<Transaction>],
        stop: &CancellationToken,
    ) -> Result<Option<H256>, Error> {
        if stop.is_cancelled() {
            return Err(interrupted("repeat check"));
        }
        if self.block.timestamp() < oldest_allowed {
            return Ok(None);
        }
        if self.status() == Status::Accepted || self.block.is_genesis() {
            return Ok(vm.is_repeat(txs, oldest_allowed));
        }
        if let Some(hit) = self.contains_any(txs) {
            return Ok(Some(hit));
        }

        let mut ancestor = vm
            .get_stateless_block(self.block.parent())
            .ok_or_else(|| Error::from(BlockError::UnknownParent(*self.block.parent())))?;
        loop {
            if stop.is_cancelled() {
                return Err(interrupted("repeat check"));
            }
            if ancestor.timestamp() < oldest_allowed {
                return Ok(None);
            }
            if ancestor.status() == Status::Accepted || ancestor.block().is_genesis() {
                return Ok(vm.is_repeat(txs, oldest_allowed));
            }
            if let Some(hit) = ancestor.contains_any(txs) {
                return Ok(Some(hit));
            }
            let parent_id = *ancestor.block().parent();
            ancestor = vm
                .get_stateless_block(&parent_id)
                .ok_or(BlockError::UnknownParent(parent_id))?;
        }
    }

    fn contains_any(&self, txs: &[Arc<Transaction>]) -> Option<H256> {
        let inner = self.inner.lock();
        let txs_set = inner.txs_set.as_ref()?;
        txs.iter()
            .find(|tx| txs_set.contains(tx.id()))
            .map(|tx| *tx.id())
    }

    /// A fresh writable view over this block's post-state, sized for
    /// `estimated_changes`.
    ///
    /// Accepted blocks (and the genesis) hand out views over the canonical
    /// state; anything else forks its own post-verify view, verifying this
    /// block on demand first if needed.
    pub fn child_state(
        &self,
        vm: &dyn Vm,
        estimated_changes: usize,
        stop: &CancellationToken,
    ) -> Result<Box<dyn StateView>, Error> {
        self.child_state_at_depth(vm, estimated_changes, stop, 0)
    }

    fn child_state_at_depth(
        &self,
        vm: &dyn Vm,
        estimated_changes: usize,
        stop: &CancellationToken,
        depth: usize,
    ) -> Result<Box<dyn StateView>, Error> {
        if stop.is_cancelled() {
            return Err(interrupted("child state"));
        }
        if self.status() == Status::Accepted || self.block.is_genesis() {
            return vm.state().view(estimated_changes);
        }
        if !self.is_processed() {
            self.verify_at_depth(vm, stop, depth)?;
        }
        let inner = self.inner.lock();
        let view = inner.view.as_ref().ok_or(BlockError::NotProcessed)?;
        Ok(view.fork(estimated_changes))
    }

    /// Commits the block.
    ///
    /// A block that was verified without state during sync either becomes
    /// the new sync target (`Ok(false)`, nothing committed) or is verified
    /// now that its parent state arrived, then committed like any other.
    pub fn accept(&self, vm: &dyn Vm, stop: &CancellationToken) -> AcceptResult {
        if stop.is_cancelled() {
            return Err(interrupted("accept"));
        }
        match self.status() {
            Status::Accepted | Status::Rejected => {
                return Err(InternalErrorKind::System
                    .other(format!("accept called on terminal block {}", self.id))
                    .into());
            }
            Status::VerifiedWithoutState => {
                if vm.update_sync_target(self) {
                    info!("block {} is the new sync target, deferring commit", self.id);
                    self.inner.lock().status = Status::Accepted;
                    vm.accepted(self);
                    return Ok(false);
                }
                self.verify(vm, stop)?;
            }
            Status::Processing => {
                self.verify(vm, stop)?;
            }
            Status::Verified => {}
        }

        let view = self
            .inner
            .lock()
            .view
            .take()
            .ok_or(BlockError::NotProcessed)?;
        view.commit()?;
        {
            let mut inner = self.inner.lock();
            inner.status = Status::Accepted;
            // Replay protection past this point is served by the VM's
            // expiring map.
            inner.txs_set = None;
        }
        vm.set_last_accepted(self)?;
        vm.accepted(self);
        info!("accepted block {}-{}", self.block.height(), self.id);
        Ok(true)
    }

    /// Marks the block rejected and releases its resources. No state
    /// effects; outstanding signature tasks are signalled to stop.
    pub fn reject(&self, vm: &dyn Vm) -> Result<(), Error> {
        {
            let mut inner = self.inner.lock();
            if let Some(job) = inner.sig_job.take() {
                job.abort();
            }
            inner.view = None;
            inner.status = Status::Rejected;
        }
        vm.rejected(self);
        info!("rejected block {}-{}", self.block.height(), self.id);
        Ok(())
    }
}

impl fmt::Debug for StatelessBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatelessBlock")
            .field("id", &self.id)
            .field("height", &self.block.height())
            .field("status", &self.status())
            .finish()
    }
}
