//! The blake2b hash with the fluxvm domain personalization.
//!
//! Block and transaction IDs are blake2b-256 digests of their canonical
//! encodings; every hash in the system goes through [`new_blake2b`] so the
//! personalization separates this chain's digests from other blake2b users.

pub use blake2b_ref::{Blake2b, Blake2bBuilder};

/// Output length of the hash function, in bytes.
pub const BLAKE2B_LEN: usize = 32;
/// The domain personalization mixed into every digest.
pub const PERSONALIZATION: &[u8] = b"flx-default-hash";

/// Creates a blake2b hasher configured for this chain.
pub fn new_blake2b() -> Blake2b {
    Blake2bBuilder::new(BLAKE2B_LEN)
        .personal(PERSONALIZATION)
        .build()
}

/// Hashes `input` in one shot.
pub fn blake2b_256<T: AsRef<[u8]>>(input: T) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut hasher = new_blake2b();
    hasher.update(input.as_ref());
    hasher.finalize(&mut result);
    result
}
