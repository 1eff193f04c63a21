//! Errors raised while admitting blocks.
//!
//! Every variant is terminal for the block that produced it: the consensus
//! engine reacts by rejecting the block. Errors carry the expected/actual
//! payloads so operators can see which peer-side computation diverged.

use fluxvm_error::{impl_error_conversion_with_kind, Error, ErrorKind};
use fluxvm_types::H256;
use thiserror::Error as ThisError;

/// The block timestamp fell outside its allowed bounds.
#[derive(ThisError, Debug, PartialEq, Eq, Clone)]
pub enum TimestampError {
    /// The timestamp does not advance past the parent's.
    #[error("block timestamp {actual} is earlier than the minimum {min}")]
    TooEarly { min: i64, actual: i64 },

    /// The timestamp sits at or beyond the local future bound.
    #[error("block timestamp {actual} is beyond the future bound {max}")]
    TooLate { max: i64, actual: i64 },
}

/// A block-level admission failure.
#[derive(ThisError, Debug, PartialEq, Eq, Clone)]
pub enum BlockError {
    /// The parent is not resolvable through the VM. This attempt is
    /// terminal, but the block itself may verify later once the parent
    /// arrives.
    #[error("unknown parent: {0}")]
    UnknownParent(H256),

    /// The transaction list is empty.
    #[error("empty transaction list")]
    NoTxs,

    /// The transaction count exceeds the rules.
    #[error("too many transactions, max({max}) < actual({actual})")]
    TooManyTxs { max: usize, actual: usize },

    /// A transaction ID repeats, either inside the block or across the
    /// ancestor chain within the validity window.
    #[error("duplicate transaction: {0}")]
    DuplicateTx(H256),

    /// The declared unit price disagrees with the execution context.
    #[error("invalid unit price, expected({expected}) actual({actual})")]
    InvalidUnitPrice { expected: u64, actual: u64 },

    /// The declared unit window disagrees with the execution context.
    #[error("invalid unit window")]
    InvalidUnitWindow,

    /// The declared block cost disagrees with the execution context.
    #[error("invalid block cost, expected({expected}) actual({actual})")]
    InvalidBlockCost { expected: u64, actual: u64 },

    /// The declared block window disagrees with the execution context.
    #[error("invalid block window")]
    InvalidBlockWindow,

    /// The declared consumed units disagree with the processor.
    #[error("invalid units consumed, expected({expected}) actual({actual})")]
    InvalidUnitsConsumed { expected: u64, actual: u64 },

    /// The declared surplus fee disagrees with the processor.
    #[error("invalid surplus fee, expected({expected}) actual({actual})")]
    InvalidSurplus { expected: u64, actual: u64 },

    /// The surplus fee does not cover the block pacing cost.
    #[error("insufficient surplus fee, required({required}) actual({actual})")]
    InsufficientSurplus { required: u64, actual: u64 },

    /// The post-execution Merkle root disagrees with the declared one.
    #[error("state root mismatch, expected({expected}) actual({actual})")]
    StateRootMismatch { expected: H256, actual: H256 },

    /// State was requested from a block that holds no post-execution view.
    #[error("block is not processed")]
    NotProcessed,
}

impl_error_conversion_with_kind!(TimestampError, ErrorKind::Header, Error);
impl_error_conversion_with_kind!(BlockError, ErrorKind::Block, Error);
