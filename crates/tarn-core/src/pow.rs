//! Proof-of-work target computation, mining, and validation.

use num_bigint::BigUint;
use num_traits::One;
use sha2::{Digest, Sha256};

use crate::constants::{DIFFICULTY, MAX_NONCE};
use crate::error::PowError;
use crate::types::{Block, Header};

/// Returns `1 << (256 - DIFFICULTY)`, the upper bound a candidate hash must
/// fall under (interpreted as a 256-bit big-endian integer).
pub fn target() -> BigUint {
    BigUint::one() << (256 - DIFFICULTY) as usize
}

/// Builds the proof-of-work preimage for `header` at the given `nonce`:
/// `prev_block_hash || transactions_bytes || ascii(timestamp) || ascii(depth) || ascii(nonce)`.
fn preimage(prev_block_hash: &[u8], transactions_bytes: &[u8], timestamp: i64, depth: u64, nonce: i64) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(prev_block_hash);
    data.extend_from_slice(transactions_bytes);
    data.extend_from_slice(timestamp.to_string().as_bytes());
    data.extend_from_slice(depth.to_string().as_bytes());
    data.extend_from_slice(nonce.to_string().as_bytes());
    data
}

fn hash_preimage(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

fn is_below_target(hash: &[u8; 32]) -> bool {
    BigUint::from_bytes_be(hash) < target()
}

/// Searches for the first nonce (starting at 0) whose hash satisfies the
/// target, mutating `header.nonce` and `header.hash` in place on success.
pub fn mine(header: &mut Header, transactions_bytes: &[u8]) -> Result<(), PowError> {
    let mut nonce: i64 = 0;
    while nonce < MAX_NONCE {
        let data = preimage(
            &header.prev_block_hash,
            transactions_bytes,
            header.timestamp,
            header.depth,
            nonce,
        );
        let hash = hash_preimage(&data);
        if is_below_target(&hash) {
            header.nonce = nonce;
            header.hash = hash;
            return Ok(());
        }
        nonce += 1;
    }
    Err(PowError::Exhausted(MAX_NONCE))
}

/// Recomputes the hash for `block.header`'s stored nonce and checks it
/// against the target.
pub fn validate(block: &Block) -> bool {
    let data = preimage(
        &block.header.prev_block_hash,
        &block.transactions_bytes(),
        block.header.timestamp,
        block.header.depth,
        block.header.nonce,
    );
    let hash = hash_preimage(&data);
    hash == block.header.hash && is_below_target(&hash)
}
