//! Initial chain parameters.
//!
//! The host ships these as TOML. The struct doubles as the [`Rules`]
//! implementation for chains whose parameters never change over time.

use serde::{Deserialize, Serialize};

use fluxvm_error::{Error, InternalErrorKind};
use fluxvm_traits::Rules;
use fluxvm_types::H256;

use crate::block::StatelessBlock;

fn default_min_unit_price() -> u64 {
    1
}

fn default_min_block_cost() -> u64 {
    1
}

fn default_max_block_txs() -> usize {
    20_000
}

fn default_validity_window() -> i64 {
    60
}

fn default_window_target_units() -> u64 {
    1_000_000
}

fn default_window_target_blocks() -> u64 {
    10
}

/// An account funded at genesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub account: H256,
    pub balance: u64,
}

/// The initial parameters of a chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Genesis {
    #[serde(default = "default_min_unit_price")]
    pub min_unit_price: u64,
    #[serde(default = "default_min_block_cost")]
    pub min_block_cost: u64,
    #[serde(default = "default_max_block_txs")]
    pub max_block_txs: usize,
    #[serde(default = "default_validity_window")]
    pub validity_window: i64,
    #[serde(default = "default_window_target_units")]
    pub window_target_units: u64,
    #[serde(default = "default_window_target_blocks")]
    pub window_target_blocks: u64,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

impl Default for Genesis {
    fn default() -> Self {
        Genesis {
            min_unit_price: default_min_unit_price(),
            min_block_cost: default_min_block_cost(),
            max_block_txs: default_max_block_txs(),
            validity_window: default_validity_window(),
            window_target_units: default_window_target_units(),
            window_target_blocks: default_window_target_blocks(),
            allocations: Vec::new(),
        }
    }
}

impl Genesis {
    pub fn from_toml(input: &str) -> Result<Self, Error> {
        toml::from_str(input).map_err(|failure| InternalErrorKind::Config.other(failure).into())
    }

    /// The genesis block for these parameters over `state_root`.
    pub fn genesis_block(&self, state_root: H256) -> Result<StatelessBlock, Error> {
        StatelessBlock::new_genesis(state_root, self.min_unit_price, self.min_block_cost)
    }
}

impl Rules for Genesis {
    fn max_block_txs(&self) -> usize {
        self.max_block_txs
    }

    fn validity_window(&self) -> i64 {
        self.validity_window
    }

    fn min_unit_price(&self) -> u64 {
        self.min_unit_price
    }

    fn min_block_cost(&self) -> u64 {
        self.min_block_cost
    }

    fn window_target_units(&self) -> u64 {
        self.window_target_units
    }

    fn window_target_blocks(&self) -> u64 {
        self.window_target_blocks
    }
}
