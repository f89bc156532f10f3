//! P-256 keypairs, transaction signing, and base58check address derivation.
//!
//! Public keys are stored and transmitted as the raw 64-byte `X||Y`
//! concatenation of the curve point (no SEC1 `0x04` prefix); signatures are
//! the raw 64-byte `r||s` concatenation of the two ECDSA scalars.

use ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::codec::{base58check_decode, base58check_encode};
use crate::constants::NETWORK_VERSION;
use crate::error::CryptoError;

/// A generated P-256 keypair, as held by a wallet.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generates a fresh random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Reconstructs a keypair from its raw 32-byte big-endian private scalar.
    pub fn from_private_scalar(bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| CryptoError::BadPublicKey)?;
        Ok(Self { signing_key })
    }

    /// The raw 32-byte big-endian private scalar.
    pub fn private_scalar(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// The raw 64-byte `X||Y` public key.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        public_key_from_verifying(self.signing_key.verifying_key())
    }

    /// Derives the base58check address for this keypair's public key.
    pub fn address(&self) -> String {
        address_from_public_key(&self.public_key_bytes())
    }

    /// Signs `message` with the raw 64-byte `r||s` encoding.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

fn public_key_from_verifying(key: &VerifyingKey) -> Vec<u8> {
    let point = key.to_encoded_point(false);
    // `point` is `0x04 || X || Y`; drop the SEC1 tag to match the wire format.
    point.as_bytes()[1..].to_vec()
}

/// Verifies a raw `r||s` signature against a raw 64-byte `X||Y` public key.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let verifying_key = decode_public_key(public_key)?;
    let sig = Signature::from_slice(signature).map_err(|_| CryptoError::BadSignature)?;
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::BadSignature)
}

/// Parses a raw 64-byte `X||Y` public key into a [`VerifyingKey`].
pub fn decode_public_key(public_key: &[u8]) -> Result<VerifyingKey, CryptoError> {
    if public_key.len() != 64 {
        return Err(CryptoError::BadPublicKey);
    }
    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..].copy_from_slice(public_key);
    VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| CryptoError::BadPublicKey)
}

/// `ripemd160(sha256(pubkey))`.
pub fn hash_public_key(public_key: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(public_key);
    let ripe = Ripemd160::digest(sha);
    ripe.into()
}

/// Derives the base58check address for a raw `X||Y` public key.
pub fn address_from_public_key(public_key: &[u8]) -> String {
    let pubkey_hash = hash_public_key(public_key);
    let mut payload = Vec::with_capacity(1 + pubkey_hash.len());
    payload.push(NETWORK_VERSION);
    payload.extend_from_slice(&pubkey_hash);
    base58check_encode(&payload)
}

/// Validates an address's checksum and returns its pubkey hash on success.
pub fn validate_address(address: &str) -> Result<[u8; 20], CryptoError> {
    let payload = base58check_decode(address).map_err(CryptoError::Codec)?;
    // payload is version(1) + pubkey_hash(20); base58check_decode already
    // stripped the checksum.
    if payload.len() != 21 {
        return Err(CryptoError::BadChecksum);
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    Ok(hash)
}
