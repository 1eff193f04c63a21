//! Transactions and the action/auth registries.
//!
//! The lifecycle core treats execution internals as a collaborator: an
//! [`Action`] knows what it touches and how to run, an [`Auth`] knows who
//! pays and how to prove it, and the [`Registry`] maps wire type ids onto
//! their decoders. The core itself only sequences and accounts for them.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;
use fluxvm_error::{impl_error_conversion_with_kind, Error, ErrorKind};
use fluxvm_fixed_hash::H256;
use fluxvm_hash::blake2b_256;
use fluxvm_traits::{Rules, StateKey, StateView};
use thiserror::Error as ThisError;

use crate::codec::{CodecError, Reader, Writer};

/// Signature verification failures.
#[derive(ThisError, Debug, PartialEq, Eq, Clone)]
pub enum AuthError {
    #[error("signature verification failed: {0}")]
    InvalidSignature(String),
}

impl_error_conversion_with_kind!(AuthError, ErrorKind::Transaction, Error);

/// What a transaction does. Implementations live with the VM host; the core
/// only sees the declared keys, the unit bound, and the execute entry point.
pub trait Action: fmt::Debug + Send + Sync {
    /// Wire discriminator the registry dispatches on.
    fn type_id(&self) -> u8;

    /// Upper bound of compute units this action may consume. A failed
    /// execution is still charged this bound.
    fn max_units(&self, rules: &dyn Rules) -> u64;

    /// The state keys this action may read or write, with chunk bounds.
    fn state_keys(&self, payer: &H256) -> Vec<StateKey>;

    /// Runs the action. Writes of earlier transactions in the same block are
    /// already visible in `view`. An error marks this transaction failed
    /// without aborting the block.
    fn execute(
        &self,
        view: &mut dyn StateView,
        rules: &dyn Rules,
        timestamp: i64,
        payer: &H256,
    ) -> Result<Bytes, Error>;

    /// Appends the canonical encoding, excluding the type id.
    fn marshal(&self, writer: &mut Writer) -> Result<(), CodecError>;
}

/// Who authorized a transaction and the proof of it.
pub trait Auth: fmt::Debug + Send + Sync {
    /// Wire discriminator the registry dispatches on.
    fn type_id(&self) -> u8;

    /// Compute units the signature check is charged at.
    fn max_units(&self, rules: &dyn Rules) -> u64;

    /// The account that pays this transaction's fee.
    fn payer(&self) -> H256;

    /// Verifies the proof over `msg`. CPU-bound; the lifecycle core runs
    /// this on the injected worker pool.
    fn verify(&self, msg: &[u8]) -> Result<(), Error>;

    /// Appends the canonical encoding, excluding the type id.
    fn marshal(&self, writer: &mut Writer) -> Result<(), CodecError>;
}

type ActionDecoder =
    Box<dyn Fn(&mut Reader<'_>) -> Result<Box<dyn Action>, CodecError> + Send + Sync>;
type AuthDecoder =
    Box<dyn Fn(&mut Reader<'_>) -> Result<Box<dyn Auth>, CodecError> + Send + Sync>;

/// Decode tables for actions and auths, keyed by wire type id.
///
/// The host registers its supported types once at startup; the transaction
/// codec consults the tables while parsing blocks.
#[derive(Default)]
pub struct Registry {
    actions: HashMap<u8, ActionDecoder>,
    auths: HashMap<u8, AuthDecoder>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action decoder. Panics on a duplicate id: the table is
    /// host configuration fixed at startup.
    pub fn register_action<F>(&mut self, type_id: u8, decoder: F)
    where
        F: Fn(&mut Reader<'_>) -> Result<Box<dyn Action>, CodecError> + Send + Sync + 'static,
    {
        let replaced = self.actions.insert(type_id, Box::new(decoder));
        assert!(replaced.is_none(), "duplicate action type id {type_id}");
    }

    /// Registers an auth decoder. Panics on a duplicate id.
    pub fn register_auth<F>(&mut self, type_id: u8, decoder: F)
    where
        F: Fn(&mut Reader<'_>) -> Result<Box<dyn Auth>, CodecError> + Send + Sync + 'static,
    {
        let replaced = self.auths.insert(type_id, Box::new(decoder));
        assert!(replaced.is_none(), "duplicate auth type id {type_id}");
    }

    pub fn decode_action(&self, reader: &mut Reader<'_>) -> Result<Box<dyn Action>, CodecError> {
        let type_id = reader.get_u8("action type id")?;
        let decoder = self
            .actions
            .get(&type_id)
            .ok_or(CodecError::UnknownTypeId {
                registry: "action",
                id: type_id,
            })?;
        decoder(reader)
    }

    pub fn decode_auth(&self, reader: &mut Reader<'_>) -> Result<Box<dyn Auth>, CodecError> {
        let type_id = reader.get_u8("auth type id")?;
        let decoder = self.auths.get(&type_id).ok_or(CodecError::UnknownTypeId {
            registry: "auth",
            id: type_id,
        })?;
        decoder(reader)
    }
}

/// The outcome of executing one transaction inside a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxResult {
    pub success: bool,
    pub units: u64,
    pub output: Bytes,
    pub fee: u64,
}

fn write_unsigned(
    writer: &mut Writer,
    nonce: u64,
    fee: u64,
    action: &dyn Action,
) -> Result<(), CodecError> {
    writer.put_u64(nonce)?;
    writer.put_u64(fee)?;
    writer.put_u8(action.type_id())?;
    action.marshal(writer)
}

/// A transaction with its canonical bytes and content-addressed ID cached.
///
/// The ID is the blake2b-256 of the canonical encoding, so equality and
/// hashing go through the ID alone.
pub struct Transaction {
    nonce: u64,
    fee: u64,
    action: Box<dyn Action>,
    auth: Box<dyn Auth>,
    bytes: Bytes,
    unsigned_len: usize,
    id: H256,
}

impl Transaction {
    /// The canonical bytes an auth signs: everything before the auth itself.
    pub fn preimage(nonce: u64, fee: u64, action: &dyn Action) -> Result<Bytes, CodecError> {
        let mut writer = Writer::new();
        write_unsigned(&mut writer, nonce, fee, action)?;
        Ok(writer.into_bytes())
    }

    pub fn new(
        nonce: u64,
        fee: u64,
        action: Box<dyn Action>,
        auth: Box<dyn Auth>,
    ) -> Result<Self, CodecError> {
        let mut writer = Writer::new();
        write_unsigned(&mut writer, nonce, fee, action.as_ref())?;
        let unsigned_len = writer.len();
        writer.put_u8(auth.type_id())?;
        auth.marshal(&mut writer)?;
        let bytes = writer.into_bytes();
        let id = H256::from(blake2b_256(&bytes));
        Ok(Transaction {
            nonce,
            fee,
            action,
            auth,
            bytes,
            unsigned_len,
            id,
        })
    }

    pub fn unmarshal(reader: &mut Reader<'_>, registry: &Registry) -> Result<Self, CodecError> {
        let start = reader.position();
        let nonce = reader.get_u64("tx nonce")?;
        let fee = reader.get_u64("tx fee")?;
        let action = registry.decode_action(reader)?;
        let unsigned_len = reader.position() - start;
        let auth = registry.decode_auth(reader)?;
        let bytes = Bytes::copy_from_slice(reader.slice_from(start));
        let id = H256::from(blake2b_256(&bytes));
        Ok(Transaction {
            nonce,
            fee,
            action,
            auth,
            bytes,
            unsigned_len,
            id,
        })
    }

    /// Appends the cached canonical encoding.
    pub fn marshal(&self, writer: &mut Writer) -> Result<(), CodecError> {
        writer.put_slice(&self.bytes)
    }

    pub fn id(&self) -> &H256 {
        &self.id
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn action(&self) -> &dyn Action {
        self.action.as_ref()
    }

    pub fn auth(&self) -> &dyn Auth {
        self.auth.as_ref()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// The portion of the canonical bytes covered by the signature.
    pub fn unsigned_bytes(&self) -> &[u8] {
        &self.bytes[..self.unsigned_len]
    }

    pub fn payer(&self) -> H256 {
        self.auth.payer()
    }

    /// Advertised compute-unit bound: action plus auth.
    pub fn max_units(&self, rules: &dyn Rules) -> u64 {
        self.action
            .max_units(rules)
            .saturating_add(self.auth.max_units(rules))
    }

    /// The state keys this transaction declares.
    pub fn state_keys(&self) -> Vec<StateKey> {
        self.action.state_keys(&self.payer())
    }

    /// Verifies the auth over the signed portion of the canonical bytes.
    pub fn verify_auth(&self) -> Result<(), Error> {
        self.auth.verify(self.unsigned_bytes())
    }

    /// Runs the action against `view`.
    pub fn execute(
        &self,
        view: &mut dyn StateView,
        rules: &dyn Rules,
        timestamp: i64,
    ) -> Result<Bytes, Error> {
        self.action.execute(view, rules, timestamp, &self.payer())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("nonce", &self.nonce)
            .field("fee", &self.fee)
            .field("action", &self.action)
            .finish()
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Transaction) -> bool {
        self.id == other.id
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(self.id.as_bytes());
    }
}
