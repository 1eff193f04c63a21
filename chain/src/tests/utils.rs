//! Shared fixtures: a transfer action, a secp256k1 auth, and chain helpers.

use std::sync::Arc;

use bytes::Bytes;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use tokio_util::sync::CancellationToken;

use fluxvm_error::{Error, OtherError};
use fluxvm_hash::blake2b_256;
use fluxvm_traits::{Rules, StateKey, StateView};
use fluxvm_types::{
    Action, Auth, AuthError, CodecError, Reader, Registry, Transaction, Writer, H256,
};

use crate::block::{StatelessBlock, Status};
use crate::builder::build_block;
use crate::genesis::Genesis;
use crate::tests::dummy::DummyVm;

pub(crate) const TRANSFER_TYPE_ID: u8 = 0;
pub(crate) const SECP_AUTH_TYPE_ID: u8 = 0;
pub(crate) const TRANSFER_COMPUTE_UNITS: u64 = 2;

/// State key of an account balance.
pub(crate) fn balance_key(account: &H256) -> Bytes {
    let mut key = Vec::with_capacity(33);
    key.push(0u8);
    key.extend_from_slice(account.as_bytes());
    Bytes::from(key)
}

pub(crate) fn encode_balance(amount: u64) -> Bytes {
    Bytes::copy_from_slice(&amount.to_be_bytes())
}

pub(crate) fn decode_balance(raw: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(raw);
    u64::from_be_bytes(buf)
}

#[derive(Debug, Clone)]
pub(crate) struct Transfer {
    pub to: H256,
    pub value: u64,
}

impl Action for Transfer {
    fn type_id(&self) -> u8 {
        TRANSFER_TYPE_ID
    }

    fn max_units(&self, _rules: &dyn Rules) -> u64 {
        TRANSFER_COMPUTE_UNITS
    }

    fn state_keys(&self, payer: &H256) -> Vec<StateKey> {
        vec![
            StateKey::new(balance_key(payer), 1),
            StateKey::new(balance_key(&self.to), 1),
        ]
    }

    fn execute(
        &self,
        view: &mut dyn StateView,
        _rules: &dyn Rules,
        _timestamp: i64,
        payer: &H256,
    ) -> Result<Bytes, Error> {
        let payer_key = balance_key(payer);
        let balance = view
            .get(&payer_key)?
            .map(|raw| decode_balance(&raw))
            .unwrap_or(0);
        if balance < self.value {
            return Err(OtherError::new("insufficient balance").into());
        }
        view.insert(payer_key, encode_balance(balance - self.value))?;

        let to_key = balance_key(&self.to);
        let recipient = view
            .get(&to_key)?
            .map(|raw| decode_balance(&raw))
            .unwrap_or(0)
            .saturating_add(self.value);
        view.insert(to_key, encode_balance(recipient))?;
        Ok(encode_balance(recipient))
    }

    fn marshal(&self, writer: &mut Writer) -> Result<(), CodecError> {
        writer.put_hash(&self.to)?;
        writer.put_u64(self.value)
    }
}

fn decode_transfer(reader: &mut Reader<'_>) -> Result<Box<dyn Action>, CodecError> {
    let to = reader.get_hash("transfer recipient")?;
    let value = reader.get_u64("transfer value")?;
    Ok(Box::new(Transfer { to, value }))
}

#[derive(Debug, Clone)]
pub(crate) struct SecpAuth {
    pubkey: PublicKey,
    signature: Signature,
}

impl Auth for SecpAuth {
    fn type_id(&self) -> u8 {
        SECP_AUTH_TYPE_ID
    }

    fn max_units(&self, _rules: &dyn Rules) -> u64 {
        0
    }

    fn payer(&self) -> H256 {
        H256::from(blake2b_256(self.pubkey.serialize()))
    }

    fn verify(&self, msg: &[u8]) -> Result<(), Error> {
        let digest = Message::from_digest(blake2b_256(msg));
        Secp256k1::verification_only()
            .verify_ecdsa(&digest, &self.signature, &self.pubkey)
            .map_err(|failure| AuthError::InvalidSignature(failure.to_string()).into())
    }

    fn marshal(&self, writer: &mut Writer) -> Result<(), CodecError> {
        writer.put_slice(&self.pubkey.serialize())?;
        writer.put_slice(&self.signature.serialize_compact())
    }
}

fn decode_secp_auth(reader: &mut Reader<'_>) -> Result<Box<dyn Auth>, CodecError> {
    let pubkey = PublicKey::from_slice(reader.get_slice(33, "auth public key")?)
        .map_err(|_| CodecError::InvalidObject("malformed secp public key"))?;
    let signature = Signature::from_compact(reader.get_slice(64, "auth signature")?)
        .map_err(|_| CodecError::InvalidObject("malformed secp signature"))?;
    Ok(Box::new(SecpAuth { pubkey, signature }))
}

pub(crate) fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_action(TRANSFER_TYPE_ID, decode_transfer);
    registry.register_auth(SECP_AUTH_TYPE_ID, decode_secp_auth);
    registry
}

pub(crate) struct Account {
    pub secret: SecretKey,
    pub public: PublicKey,
    pub address: H256,
}

pub(crate) fn random_account() -> Account {
    let secp = Secp256k1::new();
    let (secret, public) = secp.generate_keypair(&mut rand::thread_rng());
    Account {
        secret,
        public,
        address: H256::from(blake2b_256(public.serialize())),
    }
}

pub(crate) fn transfer_tx(
    from: &Account,
    to: &H256,
    value: u64,
    nonce: u64,
    fee: u64,
) -> Arc<Transaction> {
    let action = Transfer { to: *to, value };
    let preimage = Transaction::preimage(nonce, fee, &action).expect("preimage");
    let digest = Message::from_digest(blake2b_256(&preimage));
    let secp = Secp256k1::new();
    let signature = secp.sign_ecdsa(&digest, &from.secret);
    let auth = SecpAuth {
        pubkey: from.public,
        signature,
    };
    Arc::new(Transaction::new(nonce, fee, Box::new(action), Box::new(auth)).expect("transaction"))
}

/// A transfer whose signature covers different bytes than the transaction
/// carries.
pub(crate) fn badly_signed_transfer_tx(
    from: &Account,
    to: &H256,
    value: u64,
    nonce: u64,
    fee: u64,
) -> Arc<Transaction> {
    let action = Transfer { to: *to, value };
    let digest = Message::from_digest(blake2b_256(b"some other message"));
    let secp = Secp256k1::new();
    let signature = secp.sign_ecdsa(&digest, &from.secret);
    let auth = SecpAuth {
        pubkey: from.public,
        signature,
    };
    Arc::new(Transaction::new(nonce, fee, Box::new(action), Box::new(auth)).expect("transaction"))
}

pub(crate) const FUNDED_BALANCE: u64 = 1_000_000;

/// A VM whose genesis funds one account, with fee targets high enough that
/// both scalars stay pinned at their floors.
pub(crate) fn test_vm() -> (Arc<DummyVm>, Account) {
    let account = random_account();
    let genesis = Genesis {
        max_block_txs: 64,
        ..Genesis::default()
    };
    let vm = DummyVm::new(
        genesis,
        registry(),
        vec![(balance_key(&account.address), encode_balance(FUNDED_BALANCE))],
    );
    (vm, account)
}

/// Builds a child on `parent`, reparses it off the wire as a `Processing`
/// block, and registers it with the VM, mirroring a block arriving from a
/// peer proposer.
pub(crate) fn parsed_child(
    vm: &Arc<DummyVm>,
    parent: &Arc<StatelessBlock>,
    timestamp: i64,
    txs: Vec<Arc<Transaction>>,
) -> Result<Arc<StatelessBlock>, Error> {
    let stop = CancellationToken::new();
    let built = build_block(vm.as_ref(), parent, timestamp, txs, &stop)?;
    let parsed = Arc::new(StatelessBlock::parse(
        vm.as_ref(),
        built.bytes().clone(),
        Status::Processing,
        &stop,
    )?);
    vm.insert_block(Arc::clone(&parsed));
    Ok(parsed)
}
