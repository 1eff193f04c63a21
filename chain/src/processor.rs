//! Executes a block's transaction batch against a trie view.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::bounded;
use log::debug;
use tokio_util::sync::CancellationToken;

use fluxvm_error::{Error, InternalErrorKind};
use fluxvm_traits::{Rules, StateReader, StateView, Workers};
use fluxvm_types::{Block, TxResult};

use crate::interrupted;

/// Keys handed to one prefetch task.
const PREFETCH_CHUNK: usize = 16;

/// Aggregate outcome of executing a batch.
pub(crate) struct Executed {
    pub units_consumed: u64,
    pub surplus_fee: u64,
    pub results: Vec<TxResult>,
}

/// Runs the transactions of one block, strictly in order, against a view
/// supplied by the caller.
pub(crate) struct Processor<'a> {
    block: &'a Block,
}

impl<'a> Processor<'a> {
    pub(crate) fn new(block: &'a Block) -> Self {
        Processor { block }
    }

    /// Loads the union of declared state keys through `reader` on the
    /// worker pool, warming the base before the serial execution pass.
    pub(crate) fn prefetch(
        &self,
        workers: &dyn Workers,
        reader: Arc<dyn StateReader>,
        stop: &CancellationToken,
    ) -> Result<(), Error> {
        let mut seen = HashSet::new();
        let mut keys: Vec<Bytes> = Vec::new();
        for tx in self.block.txs() {
            for state_key in tx.state_keys() {
                if seen.insert(state_key.key.clone()) {
                    keys.push(state_key.key);
                }
            }
        }
        if keys.is_empty() {
            return Ok(());
        }

        let chunks: Vec<Vec<Bytes>> = keys.chunks(PREFETCH_CHUNK).map(<[Bytes]>::to_vec).collect();
        let task_count = chunks.len();
        let (done, done_rx) = bounded(task_count);
        for chunk in chunks {
            let reader = Arc::clone(&reader);
            let done = done.clone();
            let stop = stop.clone();
            workers.spawn(Box::new(move || {
                for key in &chunk {
                    if stop.is_cancelled() {
                        break;
                    }
                    let _ = reader.get(key);
                }
                let _ = done.send(());
            }));
        }
        drop(done);
        for _ in 0..task_count {
            done_rx
                .recv()
                .map_err(|_| InternalErrorKind::System.other("prefetch workers disconnected"))?;
        }
        if stop.is_cancelled() {
            return Err(interrupted("prefetch"));
        }
        Ok(())
    }

    /// Executes the batch. Transaction `i`'s writes are visible to `i + 1`;
    /// a failed transaction is still charged its advertised units and fee
    /// without aborting the block.
    pub(crate) fn execute(
        &self,
        view: &mut dyn StateView,
        rules: &dyn Rules,
        stop: &CancellationToken,
    ) -> Result<Executed, Error> {
        let txs = self.block.txs();
        let mut results = Vec::with_capacity(txs.len());
        let mut units_consumed: u64 = 0;
        let mut fee_total: u64 = 0;
        for tx in txs {
            if stop.is_cancelled() {
                return Err(interrupted("execution"));
            }
            let units = tx.max_units(rules);
            let (success, output) = match tx.execute(view, rules, self.block.timestamp()) {
                Ok(output) => (true, output),
                Err(failure) => {
                    debug!("tx {} failed: {}", tx.id(), failure);
                    (false, Bytes::new())
                }
            };
            units_consumed = units_consumed.saturating_add(units);
            fee_total = fee_total.saturating_add(tx.fee());
            results.push(TxResult {
                success,
                units,
                output,
                fee: tx.fee(),
            });
        }
        let charged = self.block.unit_price().saturating_mul(units_consumed);
        let surplus_fee = fee_total.saturating_sub(charged);
        Ok(Executed {
            units_consumed,
            surplus_fee,
            results,
        })
    }
}
