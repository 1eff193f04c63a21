//! Fee-window accounting.
//!
//! Each block commits to the fee parameters of its children: the unit price
//! follows consumed-unit pressure, the block cost follows block-production
//! pressure. Both are pure functions of the parent block, the child
//! timestamp, and the rules, so the builder and every verifier derive the
//! same four values independently.

use std::cmp;
use std::cmp::Ordering;

use fluxvm_traits::Rules;
use fluxvm_types::{Block, Window, WINDOW_SIZE};

/// Divisor of the multiplicative price step: each adjustment moves the
/// scalar by `max(1, scalar / CHANGE_DENOMINATOR)`.
pub const CHANGE_DENOMINATOR: u64 = 8;

/// One fee-market adjustment.
///
/// Pressure above `target` raises the scalar, pressure below lowers it down
/// to `floor`, exact target holds it. Monotonic in `pressure` and free of
/// wall-clock input.
pub fn next_scalar(current: u64, pressure: u64, target: u64, floor: u64) -> u64 {
    let step = cmp::max(1, current / CHANGE_DENOMINATOR);
    match pressure.cmp(&target) {
        Ordering::Greater => current.saturating_add(step),
        Ordering::Less => cmp::max(floor, current.saturating_sub(step)),
        Ordering::Equal => current,
    }
}

/// The four fee fields a child block must carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionContext {
    pub next_unit_price: u64,
    pub next_unit_window: Window,
    pub next_block_cost: u64,
    pub next_block_window: Window,
}

impl ExecutionContext {
    /// Derives the child fee parameters from the parent block.
    ///
    /// The parent's own consumption is recorded into its window first, then
    /// the window ages by the elapsed seconds, and the scalar adjusts on the
    /// aged total.
    pub fn generate(parent: &Block, timestamp: i64, rules: &dyn Rules) -> Self {
        let elapsed = cmp::min(
            timestamp.saturating_sub(parent.timestamp()).max(0) as u64,
            WINDOW_SIZE as u64,
        );

        let mut unit_window = parent.unit_window();
        unit_window.record(parent.units_consumed());
        let next_unit_window = unit_window.roll(elapsed);
        let next_unit_price = next_scalar(
            parent.unit_price(),
            next_unit_window.sum(),
            rules.window_target_units(),
            rules.min_unit_price(),
        );

        let mut block_window = parent.block_window();
        block_window.record(1);
        let next_block_window = block_window.roll(elapsed);
        let next_block_cost = next_scalar(
            parent.block_cost(),
            next_block_window.sum(),
            rules.window_target_blocks(),
            rules.min_block_cost(),
        );

        ExecutionContext {
            next_unit_price,
            next_unit_window,
            next_block_cost,
            next_block_window,
        }
    }
}
