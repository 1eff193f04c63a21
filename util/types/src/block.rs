//! The stateful block: the exact wire form plus a builder.
//!
//! Wire layout, all integers big-endian:
//!
//! ```text
//! parent(32) | timestamp(8, i64) | height(8, u64)
//! unitPrice(8, u64) | unitWindow(80)
//! blockCost(8, u64) | blockWindow(80)
//! txCount(4, i32) | tx[0] … tx[n-1]
//! stateRoot(32) | unitsConsumed(8, u64) | surplusFee(8, u64)
//! ```

use std::sync::Arc;

use bytes::Bytes;
use fluxvm_fixed_hash::H256;

use crate::codec::{CodecError, Reader, Writer};
use crate::transaction::{Registry, Transaction};
use crate::window::Window;

/// Serialized size of everything except the transaction vector.
pub const BLOCK_BASE_SIZE: usize = 32 + 8 + 8 + 8 + 80 + 8 + 80 + 4 + 32 + 8 + 8;

/// The stateful wire form of a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    parent: H256,
    timestamp: i64,
    height: u64,
    unit_price: u64,
    unit_window: Window,
    block_cost: u64,
    block_window: Window,
    txs: Vec<Arc<Transaction>>,
    state_root: H256,
    units_consumed: u64,
    surplus_fee: u64,
}

impl Block {
    pub fn parent(&self) -> &H256 {
        &self.parent
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn unit_window(&self) -> Window {
        self.unit_window
    }

    pub fn block_cost(&self) -> u64 {
        self.block_cost
    }

    pub fn block_window(&self) -> Window {
        self.block_window
    }

    pub fn txs(&self) -> &[Arc<Transaction>] {
        &self.txs
    }

    pub fn state_root(&self) -> &H256 {
        &self.state_root
    }

    pub fn units_consumed(&self) -> u64 {
        self.units_consumed
    }

    pub fn surplus_fee(&self) -> u64 {
        self.surplus_fee
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }

    /// Serialized size of the block.
    pub fn serialized_size(&self) -> usize {
        BLOCK_BASE_SIZE
            + self
                .txs
                .iter()
                .map(|tx| tx.size())
                .sum::<usize>()
    }

    /// The canonical encoding.
    pub fn marshal(&self) -> Result<Bytes, CodecError> {
        if self.txs.len() > i32::MAX as usize {
            return Err(CodecError::InvalidObject(
                "transaction count overflows the i32 frame",
            ));
        }
        let mut writer = Writer::with_capacity(self.serialized_size());
        writer.put_hash(&self.parent)?;
        writer.put_i64(self.timestamp)?;
        writer.put_u64(self.height)?;
        writer.put_u64(self.unit_price)?;
        self.unit_window.marshal(&mut writer)?;
        writer.put_u64(self.block_cost)?;
        self.block_window.marshal(&mut writer)?;
        writer.put_u32(self.txs.len() as u32)?;
        for tx in &self.txs {
            tx.marshal(&mut writer)?;
        }
        writer.put_hash(&self.state_root)?;
        writer.put_u64(self.units_consumed)?;
        writer.put_u64(self.surplus_fee)?;
        Ok(writer.into_bytes())
    }

    /// Decodes `input`, consulting `registry` for the transaction payloads.
    /// The whole input must be consumed.
    pub fn unmarshal(input: &[u8], registry: &Registry) -> Result<Block, CodecError> {
        let mut reader = Reader::new(input)?;
        let parent = reader.get_hash("parent")?;
        let timestamp = reader.get_i64("timestamp")?;
        let height = reader.get_u64("height")?;
        let unit_price = reader.get_u64("unit price")?;
        let unit_window = Window::unmarshal(&mut reader, "unit window")?;
        let block_cost = reader.get_u64("block cost")?;
        let block_window = Window::unmarshal(&mut reader, "block window")?;
        let count = reader.get_u32("transaction count")?;
        if count > i32::MAX as u32 {
            return Err(CodecError::InvalidObject(
                "transaction count overflows the i32 frame",
            ));
        }
        // The count is attacker-controlled; allocation grows with the bytes
        // actually decoded, not the declared count.
        let mut txs = Vec::with_capacity(std::cmp::min(count as usize, 1024));
        for _ in 0..count {
            txs.push(Arc::new(Transaction::unmarshal(&mut reader, registry)?));
        }
        let state_root = reader.get_hash("state root")?;
        let units_consumed = reader.get_u64("units consumed")?;
        let surplus_fee = reader.get_u64("surplus fee")?;
        reader.expect_empty("trailing bytes after block")?;
        Ok(Block {
            parent,
            timestamp,
            height,
            unit_price,
            unit_window,
            block_cost,
            block_window,
            txs,
            state_root,
            units_consumed,
            surplus_fee,
        })
    }
}

/// Builder over [`Block`], defaulting every field to zero/empty.
#[derive(Default)]
pub struct BlockBuilder {
    parent: H256,
    timestamp: i64,
    height: u64,
    unit_price: u64,
    unit_window: Window,
    block_cost: u64,
    block_window: Window,
    txs: Vec<Arc<Transaction>>,
    state_root: H256,
    units_consumed: u64,
    surplus_fee: u64,
}

impl BlockBuilder {
    pub fn from_block(block: Block) -> Self {
        let Block {
            parent,
            timestamp,
            height,
            unit_price,
            unit_window,
            block_cost,
            block_window,
            txs,
            state_root,
            units_consumed,
            surplus_fee,
        } = block;
        Self {
            parent,
            timestamp,
            height,
            unit_price,
            unit_window,
            block_cost,
            block_window,
            txs,
            state_root,
            units_consumed,
            surplus_fee,
        }
    }

    pub fn parent(mut self, parent: H256) -> Self {
        self.parent = parent;
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }

    pub fn unit_price(mut self, unit_price: u64) -> Self {
        self.unit_price = unit_price;
        self
    }

    pub fn unit_window(mut self, unit_window: Window) -> Self {
        self.unit_window = unit_window;
        self
    }

    pub fn block_cost(mut self, block_cost: u64) -> Self {
        self.block_cost = block_cost;
        self
    }

    pub fn block_window(mut self, block_window: Window) -> Self {
        self.block_window = block_window;
        self
    }

    pub fn tx(mut self, tx: Arc<Transaction>) -> Self {
        self.txs.push(tx);
        self
    }

    pub fn txs(mut self, txs: Vec<Arc<Transaction>>) -> Self {
        self.txs.extend(txs);
        self
    }

    pub fn state_root(mut self, state_root: H256) -> Self {
        self.state_root = state_root;
        self
    }

    pub fn units_consumed(mut self, units_consumed: u64) -> Self {
        self.units_consumed = units_consumed;
        self
    }

    pub fn surplus_fee(mut self, surplus_fee: u64) -> Self {
        self.surplus_fee = surplus_fee;
        self
    }

    pub fn build(self) -> Block {
        let Self {
            parent,
            timestamp,
            height,
            unit_price,
            unit_window,
            block_cost,
            block_window,
            txs,
            state_root,
            units_consumed,
            surplus_fee,
        } = self;
        Block {
            parent,
            timestamp,
            height,
            unit_price,
            unit_window,
            block_cost,
            block_window,
            txs,
            state_root,
            units_consumed,
            surplus_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Action, Auth, Registry};
    use bytes::Bytes;
    use fluxvm_error::Error;
    use fluxvm_traits::{Rules, StateKey, StateView};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct NoopAction {
        payload: u64,
    }

    impl Action for NoopAction {
        fn type_id(&self) -> u8 {
            7
        }

        fn max_units(&self, _rules: &dyn Rules) -> u64 {
            1
        }

        fn state_keys(&self, _payer: &H256) -> Vec<StateKey> {
            Vec::new()
        }

        fn execute(
            &self,
            _view: &mut dyn StateView,
            _rules: &dyn Rules,
            _timestamp: i64,
            _payer: &H256,
        ) -> Result<Bytes, Error> {
            Ok(Bytes::new())
        }

        fn marshal(&self, writer: &mut Writer) -> Result<(), CodecError> {
            writer.put_u64(self.payload)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct NoopAuth {
        signer: H256,
    }

    impl Auth for NoopAuth {
        fn type_id(&self) -> u8 {
            3
        }

        fn max_units(&self, _rules: &dyn Rules) -> u64 {
            0
        }

        fn payer(&self) -> H256 {
            self.signer
        }

        fn verify(&self, _msg: &[u8]) -> Result<(), Error> {
            Ok(())
        }

        fn marshal(&self, writer: &mut Writer) -> Result<(), CodecError> {
            writer.put_hash(&self.signer)
        }
    }

    fn decode_noop_action(reader: &mut Reader<'_>) -> Result<Box<dyn Action>, CodecError> {
        let payload = reader.get_u64("noop payload")?;
        Ok(Box::new(NoopAction { payload }))
    }

    fn decode_noop_auth(reader: &mut Reader<'_>) -> Result<Box<dyn Auth>, CodecError> {
        let signer = reader.get_hash("noop signer")?;
        Ok(Box::new(NoopAuth { signer }))
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_action(7, decode_noop_action);
        registry.register_auth(3, decode_noop_auth);
        registry
    }

    fn sample_tx(nonce: u64) -> Arc<Transaction> {
        let action = Box::new(NoopAction { payload: nonce * 10 });
        let auth = Box::new(NoopAuth {
            signer: H256::from([9u8; 32]),
        });
        Arc::new(Transaction::new(nonce, 100 + nonce, action, auth).unwrap())
    }

    fn sample_block() -> Block {
        BlockBuilder::default()
            .parent(H256::from([1u8; 32]))
            .timestamp(1_700_000_000)
            .height(42)
            .unit_price(3)
            .unit_window(Window::from_buckets([1, 0, 0, 0, 0, 0, 0, 0, 0, 2]))
            .block_cost(5)
            .block_window(Window::from_buckets([0, 0, 0, 0, 0, 0, 0, 0, 0, 1]))
            .txs(vec![sample_tx(1), sample_tx(2)])
            .state_root(H256::from([8u8; 32]))
            .units_consumed(2)
            .surplus_fee(198)
            .build()
    }

    #[test]
    fn codec_round_trip() {
        let block = sample_block();
        let bytes = block.marshal().unwrap();
        assert_eq!(bytes.len(), block.serialized_size());
        let decoded = Block::unmarshal(&bytes, &registry()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn tx_ids_survive_the_round_trip() {
        let block = sample_block();
        let bytes = block.marshal().unwrap();
        let decoded = Block::unmarshal(&bytes, &registry()).unwrap();
        for (original, parsed) in block.txs().iter().zip(decoded.txs()) {
            assert_eq!(original.id(), parsed.id());
            assert_eq!(original.unsigned_bytes(), parsed.unsigned_bytes());
        }
    }

    #[test]
    fn trailing_bytes_fail() {
        let block = sample_block();
        let mut bytes = block.marshal().unwrap().to_vec();
        bytes.push(0);
        assert_eq!(
            Block::unmarshal(&bytes, &registry()),
            Err(CodecError::InvalidObject("trailing bytes after block"))
        );
    }

    #[test]
    fn truncation_fails_with_the_field_name() {
        let block = sample_block();
        let bytes = block.marshal().unwrap();
        let err = Block::unmarshal(&bytes[..20], &registry()).unwrap_err();
        assert_eq!(err, CodecError::UnexpectedEof("parent"));
    }

    #[test]
    fn unknown_action_id_fails() {
        let block = sample_block();
        let bytes = block.marshal().unwrap();
        let registry = Registry::new();
        assert_eq!(
            Block::unmarshal(&bytes, &registry),
            Err(CodecError::UnknownTypeId {
                registry: "action",
                id: 7
            })
        );
    }
}
