//! Provides the essential wire types for fluxvm.
//!
//! - [`codec`]: the deterministic big-endian encoding every wire artifact
//!   uses, bounded by [`codec::NETWORK_SIZE_LIMIT`].
//! - [`window`]: the fixed-size rolling buckets backing the fee market.
//! - [`transaction`]: transactions and the action/auth registries.
//! - [`block`]: the stateful block and its builder.

pub mod block;
pub mod codec;
pub mod transaction;
pub mod window;

pub use block::{Block, BlockBuilder};
pub use codec::{CodecError, Reader, Writer, NETWORK_SIZE_LIMIT};
pub use transaction::{Action, Auth, AuthError, Registry, Transaction, TxResult};
pub use window::{Window, WINDOW_SIZE};

pub use bytes;
pub use fluxvm_fixed_hash::H256;
