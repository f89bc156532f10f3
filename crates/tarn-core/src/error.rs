//! Typed errors for the core codec, crypto, transaction, and proof-of-work subsystems.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("base58 payload shorter than the checksum suffix")]
    PayloadTooShort,

    #[error("base58check checksum does not match payload")]
    BadChecksum,

    #[error("unexpected end of buffer while decoding {0}")]
    Truncated(&'static str),

    #[error("json decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("public key is not a valid P-256 point")]
    BadPublicKey,

    #[error("signature is not well-formed")]
    BadSignature,

    #[error("address checksum mismatch")]
    BadChecksum,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Error)]
pub enum TxError {
    #[error("transaction signature verification failed")]
    BadSignature,

    #[error("transaction references an unknown previous output")]
    UnknownInput,

    #[error("input value does not equal output value")]
    UnbalancedValues,

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum PowError {
    #[error("nonce search exhausted {0} without finding a valid hash")]
    Exhausted(i64),
}
