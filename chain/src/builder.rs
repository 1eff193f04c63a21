//! Local block assembly.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use fluxvm_error::Error;
use fluxvm_fee::ExecutionContext;
use fluxvm_types::{BlockBuilder, Transaction};

use crate::block::{StatelessBlock, Status};
use crate::interrupted;
use crate::processor::Processor;
use crate::vm::Vm;

/// Assembles and locally executes a child of `parent`.
///
/// The fee fields come from the execution context, the commitment tuple
/// from actually running the batch against the parent's child state. The
/// caller selects the transactions; mempool admission (including signature
/// checks) stays external, which is why the result carries its execution
/// results and skips the signature job.
pub fn build_block(
    vm: &dyn Vm,
    parent: &Arc<StatelessBlock>,
    timestamp: i64,
    txs: Vec<Arc<Transaction>>,
    stop: &CancellationToken,
) -> Result<StatelessBlock, Error> {
    if stop.is_cancelled() {
        return Err(interrupted("build"));
    }
    let rules = vm.rules(timestamp);
    let context = ExecutionContext::generate(parent.block(), timestamp, rules.as_ref());
    let mut view = parent.child_state(vm, 2 * txs.len(), stop)?;

    let provisional = BlockBuilder::default()
        .parent(*parent.id())
        .timestamp(timestamp)
        .height(parent.height() + 1)
        .unit_price(context.next_unit_price)
        .unit_window(context.next_unit_window)
        .block_cost(context.next_block_cost)
        .block_window(context.next_block_window)
        .txs(txs)
        .build();

    let processor = Processor::new(&provisional);
    processor.prefetch(vm.workers().as_ref(), view.reader(), stop)?;
    let executed = processor.execute(view.as_mut(), rules.as_ref(), stop)?;
    let state_root = view.root()?;

    let block = BlockBuilder::from_block(provisional)
        .state_root(state_root)
        .units_consumed(executed.units_consumed)
        .surplus_fee(executed.surplus_fee)
        .build();
    let bytes = block.marshal()?;

    let built = StatelessBlock::from_parts(vm, block, bytes, Status::Processing, true, stop)?;
    built.attach_execution(view, executed.results);
    Ok(built)
}
