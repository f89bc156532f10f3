//! Block and header types, and their canonical byte encoding.

use crate::codec::{ByteReader, ByteWriter};
use crate::error::CodecError;
use crate::transaction::Transaction;

/// A block header. `prev_block_hash` is empty for the genesis block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub prev_block_hash: Vec<u8>,
    pub hash: [u8; 32],
    pub timestamp: i64,
    pub depth: u64,
    pub nonce: i64,
}

impl Header {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes_lp(&self.prev_block_hash);
        w.write_fixed(&self.hash);
        w.write_i64_le(self.timestamp);
        w.write_u64_le(self.depth);
        w.write_i64_le(self.nonce);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = ByteReader::new(bytes);
        let prev_block_hash = r.read_bytes_lp("header.prev_block_hash")?;
        let hash: [u8; 32] = r
            .read_fixed(32, "header.hash")?
            .try_into()
            .map_err(|_| CodecError::Truncated("header.hash"))?;
        let timestamp = r.read_i64_le("header.timestamp")?;
        let depth = r.read_u64_le("header.depth")?;
        let nonce = r.read_i64_le("header.nonce")?;
        Ok(Self {
            prev_block_hash,
            hash,
            timestamp,
            depth,
            nonce,
        })
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_block_hash.is_empty()
    }
}

/// A block: a header plus the ordered transactions it commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        let header_bytes = self.header.to_bytes();
        w.write_bytes_lp(&header_bytes);
        w.write_u64_le(self.transactions.len() as u64);
        for tx in &self.transactions {
            w.write_bytes_lp(&tx.to_bytes());
        }
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = ByteReader::new(bytes);
        let header_bytes = r.read_bytes_lp("block.header")?;
        let header = Header::from_bytes(&header_bytes)?;
        let count = r.read_u64_le("block.tx_count")?;
        let mut transactions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tx_bytes = r.read_bytes_lp("block.tx")?;
            transactions.push(Transaction::from_bytes(&tx_bytes)?);
        }
        Ok(Self {
            header,
            transactions,
        })
    }

    /// Concatenated canonical bytes of every transaction, in order — the
    /// `all_transactions_serialized` term of the proof-of-work preimage.
    pub fn transactions_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for tx in &self.transactions {
            out.extend_from_slice(&tx.to_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    #[test]
    fn header_round_trips_through_bytes() {
        let header = Header {
            prev_block_hash: vec![7; 32],
            hash: [9; 32],
            timestamp: 1_700_000_000,
            depth: 42,
            nonce: 12345,
        };
        let decoded = Header::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn genesis_header_has_empty_prev_hash() {
        let header = Header {
            prev_block_hash: vec![],
            hash: [0; 32],
            timestamp: 0,
            depth: 1,
            nonce: 0,
        };
        assert!(header.is_genesis());
        let decoded = Header::from_bytes(&header.to_bytes()).unwrap();
        assert!(decoded.is_genesis());
    }

    #[test]
    fn block_round_trips_through_bytes() {
        let tx = Transaction::new_coinbase(&[1, 2, 3], 25);
        let header = Header {
            prev_block_hash: vec![],
            hash: [1; 32],
            timestamp: 100,
            depth: 1,
            nonce: 5,
        };
        let block = Block {
            header,
            transactions: vec![tx],
        };
        let decoded = Block::from_bytes(&block.to_bytes()).unwrap();
        assert_eq!(block, decoded);
    }
}
