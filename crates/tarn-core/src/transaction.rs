//! Transaction inputs, outputs, and the transaction itself: hashing,
//! signing, and verification.

use sha2::{Digest, Sha256};

use crate::codec::{ByteReader, ByteWriter};
use crate::crypto::{self, KeyPair};
use crate::error::{CodecError, CryptoError, TxError};

/// A transaction input. A coinbase input has an all-zero `prev_tx_id` and a
/// `prev_out_index` of `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub prev_tx_id: [u8; 32],
    pub prev_out_index: i64,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl TxIn {
    pub fn is_coinbase(&self) -> bool {
        self.prev_tx_id == [0u8; 32] && self.prev_out_index == -1
    }

    fn write(&self, w: &mut ByteWriter) {
        w.write_fixed(&self.prev_tx_id);
        w.write_i64_le(self.prev_out_index);
        w.write_bytes_lp(&self.signature);
        w.write_bytes_lp(&self.public_key);
    }

    fn read(r: &mut ByteReader) -> Result<Self, CodecError> {
        let prev_tx_id: [u8; 32] = r
            .read_fixed(32, "txin.prev_tx_id")?
            .try_into()
            .map_err(|_| CodecError::Truncated("txin.prev_tx_id"))?;
        let prev_out_index = r.read_i64_le("txin.prev_out_index")?;
        let signature = r.read_bytes_lp("txin.signature")?;
        let public_key = r.read_bytes_lp("txin.public_key")?;
        Ok(Self {
            prev_tx_id,
            prev_out_index,
            signature,
            public_key,
        })
    }
}

/// A transaction output: a value locked to a public key hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub pubkey_hash: [u8; 20],
}

impl TxOut {
    pub fn locked_to(value: u64, address: &str) -> Result<Self, CryptoError> {
        let pubkey_hash = crypto::validate_address(address)?;
        Ok(Self { value, pubkey_hash })
    }

    pub fn is_locked_with(&self, pubkey_hash: &[u8; 20]) -> bool {
        &self.pubkey_hash == pubkey_hash
    }

    fn write(&self, w: &mut ByteWriter) {
        w.write_u64_le(self.value);
        w.write_fixed(&self.pubkey_hash);
    }

    fn read(r: &mut ByteReader) -> Result<Self, CodecError> {
        let value = r.read_u64_le("txout.value")?;
        let pubkey_hash: [u8; 20] = r
            .read_fixed(20, "txout.pubkey_hash")?
            .try_into()
            .map_err(|_| CodecError::Truncated("txout.pubkey_hash"))?;
        Ok(Self { value, pubkey_hash })
    }
}

/// A transaction: an id, its inputs, and its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: [u8; 32],
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
}

impl Transaction {
    /// Builds the coinbase transaction paid to `address` for mining a block.
    pub fn new_coinbase(pubkey_hash: &[u8], subsidy: u64) -> Self {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&pubkey_hash[..20]);
        let mut tx = Self {
            id: [0u8; 32],
            inputs: vec![TxIn {
                prev_tx_id: [0u8; 32],
                prev_out_index: -1,
                signature: Vec::new(),
                public_key: Vec::new(),
            }],
            outputs: vec![TxOut {
                value: subsidy,
                pubkey_hash: hash,
            }],
        };
        tx.id = tx.compute_id();
        tx
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Canonical bytes of inputs + outputs only, excluding the `id` field —
    /// this is what both the id hash and the signing preimage are built on.
    fn body_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_u64_le(self.inputs.len() as u64);
        for input in &self.inputs {
            input.write(&mut w);
        }
        w.write_u64_le(self.outputs.len() as u64);
        for output in &self.outputs {
            output.write(&mut w);
        }
        w.into_bytes()
    }

    fn compute_id(&self) -> [u8; 32] {
        Sha256::digest(self.body_bytes()).into()
    }

    /// Recomputes and returns the id; does not mutate `self`.
    pub fn hash(&self) -> [u8; 32] {
        self.compute_id()
    }

    /// Deep copy with every input's signature cleared, used as the
    /// preimage basis for both signing and verification.
    pub fn clone_for_sign(&self) -> Self {
        let mut cloned = self.clone();
        for input in cloned.inputs.iter_mut() {
            input.signature.clear();
        }
        cloned
    }

    fn signing_preimage(&self) -> Vec<u8> {
        hex::encode(self.clone_for_sign().body_bytes()).into_bytes()
    }

    /// Signs every input with `keypair`. No-op for a coinbase transaction.
    pub fn sign(&mut self, keypair: &KeyPair) {
        if self.is_coinbase() {
            return;
        }
        for input in self.inputs.iter_mut() {
            input.public_key = keypair.public_key_bytes();
        }
        let preimage = self.signing_preimage();
        let signature = keypair.sign(&preimage);
        for input in self.inputs.iter_mut() {
            input.signature = signature.clone();
        }
    }

    /// Verifies every input's signature. Coinbase transactions are exempt.
    pub fn verify_signature(&self) -> Result<(), TxError> {
        if self.is_coinbase() {
            return Ok(());
        }
        let preimage = self.signing_preimage();
        for input in &self.inputs {
            crypto::verify(&input.public_key, &preimage, &input.signature)
                .map_err(|_| TxError::BadSignature)?;
        }
        Ok(())
    }

    /// Sum of this transaction's output values.
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    /// Checks that the sum of referenced previous outputs equals the sum of
    /// this transaction's outputs. `prev_outputs[i]` must be the output
    /// referenced by `self.inputs[i]`. Coinbase transactions are exempt.
    pub fn verify_values(&self, prev_outputs: &[TxOut]) -> Result<(), TxError> {
        if self.is_coinbase() {
            return Ok(());
        }
        if prev_outputs.len() != self.inputs.len() {
            return Err(TxError::UnknownInput);
        }
        let input_sum: u64 = prev_outputs.iter().map(|o| o.value).sum();
        if input_sum != self.total_output_value() {
            return Err(TxError::UnbalancedValues);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_fixed(&self.id);
        let body = self.body_bytes();
        w.write_bytes_lp(&body);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = ByteReader::new(bytes);
        let id: [u8; 32] = r
            .read_fixed(32, "tx.id")?
            .try_into()
            .map_err(|_| CodecError::Truncated("tx.id"))?;
        let body = r.read_bytes_lp("tx.body")?;
        let mut br = ByteReader::new(&body);
        let n_inputs = br.read_u64_le("tx.n_inputs")?;
        let mut inputs = Vec::with_capacity(n_inputs as usize);
        for _ in 0..n_inputs {
            inputs.push(TxIn::read(&mut br)?);
        }
        let n_outputs = br.read_u64_le("tx.n_outputs")?;
        let mut outputs = Vec::with_capacity(n_outputs as usize);
        for _ in 0..n_outputs {
            outputs.push(TxOut::read(&mut br)?);
        }
        Ok(Self {
            id,
            inputs,
            outputs,
        })
    }
}
