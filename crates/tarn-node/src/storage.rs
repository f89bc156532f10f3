//! RocksDB-backed chain store and UTXO index.
//!
//! Two column families live in one store directory: `blocks` (every block
//! keyed by its hash, plus the reserved tip pointer under key `"l"`) and
//! `utxo` (every unspent-output map keyed by transaction id).

use std::path::Path;
use std::thread::sleep;
use std::time::{Duration, Instant};

use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use tarn_core::codec::{ByteReader, ByteWriter};
use tarn_core::pow;
use tarn_core::transaction::{Transaction, TxIn, TxOut};
use tarn_core::types::{Block, Header};
use tarn_network::sync::ChainAccess;
use tracing::{info, warn};

use crate::error::StoreError;

const CF_BLOCKS: &str = "blocks";
const CF_UTXO: &str = "utxo";
const TIP_KEY: &[u8] = b"l";

const LOCK_WAIT: Duration = Duration::from_millis(1000);
const LOCK_POLL: Duration = Duration::from_millis(100);

/// The durable chain store plus its sibling UTXO index, sharing one RocksDB
/// handle (one column family each).
pub struct ChainStore {
    db: DB,
}

impl ChainStore {
    /// Creates a brand-new store at `path`. Fails if the path already
    /// exists, matching the reference tool's `init` contract.
    pub fn init(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            return Err(StoreError::AlreadyExists(path.display().to_string()));
        }
        Self::open_with(path, true)
    }

    /// Opens an existing store at `path`, waiting briefly for another
    /// process's exclusive lock to clear before giving up.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::Missing(path.display().to_string()));
        }
        let start = Instant::now();
        loop {
            match Self::open_with(path, false) {
                Ok(store) => return Ok(store),
                Err(StoreError::Rocks(msg)) if msg.to_lowercase().contains("lock") => {
                    if start.elapsed() >= LOCK_WAIT {
                        return Err(StoreError::Locked);
                    }
                    sleep(LOCK_POLL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn open_with(path: &Path, create: bool) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(create);
        db_opts.create_missing_column_families(create);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_BLOCKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_UTXO, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cfs)?;
        Ok(Self { db })
    }

    fn blocks_cf(&self) -> &rocksdb::ColumnFamily {
        self.db.cf_handle(CF_BLOCKS).expect("blocks cf must exist")
    }

    fn utxo_cf(&self) -> &rocksdb::ColumnFamily {
        self.db.cf_handle(CF_UTXO).expect("utxo cf must exist")
    }

    /// The tip block's hash, or empty if the store has no blocks yet.
    pub fn tip_hash(&self) -> Vec<u8> {
        self.db
            .get_cf(self.blocks_cf(), TIP_KEY)
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    fn get_block_by_hash(&self, hash: &[u8]) -> Result<Option<Block>, StoreError> {
        match self.db.get_cf(self.blocks_cf(), hash)? {
            Some(bytes) => Ok(Some(Block::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn tip(&self) -> Result<Option<Block>, StoreError> {
        let tip_hash = self.tip_hash();
        if tip_hash.is_empty() {
            return Ok(None);
        }
        self.get_block_by_hash(&tip_hash)
    }

    /// The tip's depth, or 0 if the store is empty.
    pub fn depth(&self) -> u64 {
        self.tip().ok().flatten().map(|b| b.header.depth).unwrap_or(0)
    }

    /// Walks the chain from tip to genesis looking for the block at `depth`.
    pub fn get_by_depth(&self, depth: u64) -> Result<Option<Block>, StoreError> {
        for block in self.iterate()? {
            let block = block?;
            if block.header.depth == depth {
                return Ok(Some(block));
            }
            if block.header.depth < depth {
                break;
            }
        }
        Ok(None)
    }

    /// Iterates blocks from tip to genesis by following `prev_block_hash`.
    pub fn iterate(&self) -> Result<ChainIter<'_>, StoreError> {
        Ok(ChainIter {
            store: self,
            next_hash: self.tip_hash(),
        })
    }

    /// Appends `block`. If its proof-of-work is invalid, re-mines it in
    /// place rather than rejecting it (a faithful reproduction of the
    /// reference tool's behavior, not a bug fix). Accepts only if
    /// `block.depth > tip.depth && block.prev_block_hash == tip.prev_block_hash`
    /// — compared against the tip's *own* previous hash, not the tip's
    /// hash; preserved verbatim rather than "corrected".
    pub fn append(&self, mut block: Block) -> Result<bool, StoreError> {
        if !pow::validate(&block) {
            warn!(depth = block.header.depth, "block failed PoW validation, re-mining");
            let tx_bytes = block.transactions_bytes();
            pow::mine(&mut block.header, &tx_bytes)
                .map_err(|_| StoreError::Corrupt("nonce search exhausted".into()))?;
        }

        let current_tip = self.tip()?;
        let accepted = match &current_tip {
            None => true,
            Some(tip) => {
                block.header.depth > tip.header.depth
                    && block.header.prev_block_hash == tip.header.prev_block_hash
            }
        };

        if !accepted {
            return Ok(false);
        }

        let hash = block.header.hash.to_vec();
        let bytes = block.to_bytes();
        self.db.put_cf(self.blocks_cf(), &hash, &bytes)?;
        self.db.put_cf(self.blocks_cf(), TIP_KEY, &hash)?;
        info!(depth = block.header.depth, "appended block");
        Ok(true)
    }

    // --- UTXO index --------------------------------------------------

    /// Drops and rebuilds the UTXO index from the chain, tip to genesis.
    pub fn rearrange_utxo(&self) -> Result<(), StoreError> {
        let keys: Vec<Vec<u8>> = self
            .db
            .iterator_cf(self.utxo_cf(), rocksdb::IteratorMode::Start)
            .filter_map(|r| r.ok())
            .map(|(k, _)| k.to_vec())
            .collect();
        for key in keys {
            self.db.delete_cf(self.utxo_cf(), &key)?;
        }

        let mut spent: std::collections::HashSet<(Vec<u8>, i64)> = std::collections::HashSet::new();
        let mut unspent: std::collections::HashMap<Vec<u8>, Vec<(u32, TxOut)>> =
            std::collections::HashMap::new();

        for block in self.iterate()? {
            let block = block?;
            for tx in &block.transactions {
                for input in &tx.inputs {
                    if !tx.is_coinbase() {
                        spent.insert((input.prev_tx_id.to_vec(), input.prev_out_index));
                    }
                }
            }
        }

        for block in self.iterate()? {
            let block = block?;
            for tx in &block.transactions {
                for (idx, out) in tx.outputs.iter().enumerate() {
                    if !spent.contains(&(tx.id.to_vec(), idx as i64)) {
                        unspent
                            .entry(tx.id.to_vec())
                            .or_default()
                            .push((idx as u32, out.clone()));
                    }
                }
            }
        }

        for (tx_id, outs) in unspent {
            self.db.put_cf(self.utxo_cf(), &tx_id, encode_utxo_map(&outs))?;
        }
        Ok(())
    }

    fn load_utxo_map(&self, tx_id: &[u8]) -> Result<Vec<(u32, TxOut)>, StoreError> {
        match self.db.get_cf(self.utxo_cf(), tx_id)? {
            Some(bytes) => decode_utxo_map(&bytes).map_err(StoreError::from),
            None => Ok(Vec::new()),
        }
    }

    /// Accumulates outputs locked to `pubkey_hash` until their sum reaches
    /// `need` (early exit is `sum >= need`, not `>`), returning the running
    /// sum and the `(tx_id, output_index, output)` selection.
    pub fn find_spendable(
        &self,
        pubkey_hash: &[u8; 20],
        need: u64,
    ) -> Result<(u64, Vec<(Vec<u8>, u32, TxOut)>), StoreError> {
        let mut sum = 0u64;
        let mut selected = Vec::new();

        let iter = self.db.iterator_cf(self.utxo_cf(), rocksdb::IteratorMode::Start);
        for item in iter {
            let (tx_id, bytes) = item.map_err(StoreError::from)?;
            let outs = decode_utxo_map(&bytes)?;
            for (idx, out) in outs {
                if sum >= need {
                    break;
                }
                if out.is_locked_with(pubkey_hash) {
                    sum += out.value;
                    selected.push((tx_id.to_vec(), idx, out));
                }
            }
            if sum >= need {
                break;
            }
        }
        Ok((sum, selected))
    }

    /// Sum of all output values locked to `pubkey_hash`.
    pub fn balance(&self, pubkey_hash: &[u8; 20]) -> Result<u64, StoreError> {
        let mut total = 0u64;
        let iter = self.db.iterator_cf(self.utxo_cf(), rocksdb::IteratorMode::Start);
        for item in iter {
            let (_, bytes) = item.map_err(StoreError::from)?;
            for (_, out) in decode_utxo_map(&bytes)? {
                if out.is_locked_with(pubkey_hash) {
                    total += out.value;
                }
            }
        }
        Ok(total)
    }

    /// Rejects if any input references a `(prev_tx_id, prev_out_index)`
    /// absent from the UTXO index.
    pub fn verify_inputs(&self, inputs: &[TxIn]) -> Result<bool, StoreError> {
        for input in inputs {
            let outs = self.load_utxo_map(&input.prev_tx_id)?;
            if !outs.iter().any(|(idx, _)| *idx as i64 == input.prev_out_index) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Looks up the output referenced by a single input, for value-balance
    /// checks ahead of appending a new block.
    pub fn find_output(&self, tx_id: &[u8], index: i64) -> Result<Option<TxOut>, StoreError> {
        let outs = self.load_utxo_map(tx_id)?;
        Ok(outs.into_iter().find(|(idx, _)| *idx as i64 == index).map(|(_, o)| o))
    }

    /// Removes spent outputs and inserts new ones for every transaction in
    /// `block`.
    pub fn update_utxo(&self, block: &Block) -> Result<(), StoreError> {
        for tx in &block.transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let mut remaining = self.load_utxo_map(&input.prev_tx_id)?;
                    remaining.retain(|(idx, _)| *idx as i64 != input.prev_out_index);
                    if remaining.is_empty() {
                        self.db.delete_cf(self.utxo_cf(), &input.prev_tx_id)?;
                    } else {
                        self.db
                            .put_cf(self.utxo_cf(), &input.prev_tx_id, encode_utxo_map(&remaining))?;
                    }
                }
            }
            let outs: Vec<(u32, TxOut)> = tx
                .outputs
                .iter()
                .enumerate()
                .map(|(i, o)| (i as u32, o.clone()))
                .collect();
            self.db.put_cf(self.utxo_cf(), &tx.id, encode_utxo_map(&outs))?;
        }
        Ok(())
    }
}

fn encode_utxo_map(outs: &[(u32, TxOut)]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u64_le(outs.len() as u64);
    for (idx, out) in outs {
        w.write_u64_le(*idx as u64);
        w.write_u64_le(out.value);
        w.write_fixed(&out.pubkey_hash);
    }
    w.into_bytes()
}

fn decode_utxo_map(bytes: &[u8]) -> Result<Vec<(u32, TxOut)>, tarn_core::error::CodecError> {
    let mut r = ByteReader::new(bytes);
    let n = r.read_u64_le("utxo.count")?;
    let mut outs = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let idx = r.read_u64_le("utxo.index")? as u32;
        let value = r.read_u64_le("utxo.value")?;
        let pubkey_hash: [u8; 20] = r
            .read_fixed(20, "utxo.pubkey_hash")?
            .try_into()
            .map_err(|_| tarn_core::error::CodecError::Truncated("utxo.pubkey_hash"))?;
        outs.push((idx, TxOut { value, pubkey_hash }));
    }
    Ok(outs)
}

/// Iterator over blocks from tip to genesis.
pub struct ChainIter<'a> {
    store: &'a ChainStore,
    next_hash: Vec<u8>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = Result<Block, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_hash.is_empty() {
            return None;
        }
        match self.store.get_block_by_hash(&self.next_hash) {
            Ok(Some(block)) => {
                self.next_hash = block.header.prev_block_hash.clone();
                Some(Ok(block))
            }
            Ok(None) => None,
            Err(e) => {
                self.next_hash = Vec::new();
                Some(Err(e))
            }
        }
    }
}

/// Builds and appends the genesis block paid to `pubkey_hash`.
pub fn mine_genesis(store: &ChainStore, pubkey_hash: &[u8; 20]) -> Result<Block, StoreError> {
    let coinbase = Transaction::new_coinbase(pubkey_hash, tarn_core::constants::SUBSIDY);
    let mut header = Header {
        prev_block_hash: Vec::new(),
        hash: [0; 32],
        timestamp: unix_timestamp(),
        depth: 1,
        nonce: 0,
    };
    let mut block = Block {
        header: header.clone(),
        transactions: vec![coinbase],
    };
    let tx_bytes = block.transactions_bytes();
    pow::mine(&mut header, &tx_bytes).map_err(|_| StoreError::Corrupt("genesis mining exhausted".into()))?;
    block.header = header;
    store.append(block.clone())?;
    Ok(block)
}

impl ChainAccess for ChainStore {
    fn depth(&self) -> u64 {
        ChainStore::depth(self)
    }

    fn header_at(&self, depth: u64) -> Option<Header> {
        ChainStore::get_by_depth(self, depth).ok().flatten().map(|b| b.header)
    }

    fn append_block(&self, block: Block) -> bool {
        ChainStore::append(self, block).unwrap_or(false)
    }
}

fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, ChainStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");
        let store = ChainStore::init(&path).unwrap();
        (dir, store)
    }

    #[test]
    fn init_fails_if_path_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");
        ChainStore::init(&path).unwrap();
        assert!(ChainStore::init(&path).is_err());
    }

    #[test]
    fn open_fails_if_path_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope");
        assert!(ChainStore::open(&path).is_err());
    }

    #[test]
    fn empty_store_has_zero_depth_and_empty_tip() {
        let (_dir, store) = temp_store();
        assert_eq!(store.depth(), 0);
        assert!(store.tip_hash().is_empty());
    }

    #[test]
    fn genesis_block_becomes_tip() {
        let (_dir, store) = temp_store();
        let genesis = mine_genesis(&store, &[1u8; 20]).unwrap();
        assert_eq!(store.depth(), 1);
        assert_eq!(store.tip().unwrap().unwrap().header.hash, genesis.header.hash);
    }

    #[test]
    fn append_rejects_block_whose_prev_hash_is_not_the_tips_prev_hash() {
        let (_dir, store) = temp_store();
        mine_genesis(&store, &[1u8; 20]).unwrap();

        let coinbase = Transaction::new_coinbase(&[2u8; 20], 25);
        let mut header = Header {
            prev_block_hash: vec![0xAA; 32],
            hash: [0; 32],
            timestamp: 2,
            depth: 2,
            nonce: 0,
        };
        let tx_bytes_block = Block {
            header: header.clone(),
            transactions: vec![coinbase.clone()],
        }
        .transactions_bytes();
        pow::mine(&mut header, &tx_bytes_block).unwrap();
        let bogus = Block {
            header,
            transactions: vec![coinbase],
        };
        assert!(!store.append(bogus).unwrap());
    }

    #[test]
    fn append_remines_block_with_invalid_pow_instead_of_rejecting() {
        let (_dir, store) = temp_store();
        let genesis = mine_genesis(&store, &[1u8; 20]).unwrap();

        let coinbase = Transaction::new_coinbase(&[2u8; 20], 25);
        let bad_header = Header {
            prev_block_hash: genesis.header.prev_block_hash.clone(),
            hash: [0; 32],
            timestamp: 3,
            depth: 2,
            nonce: 0,
        };
        let bad_block = Block {
            header: bad_header,
            transactions: vec![coinbase],
        };
        assert!(store.append(bad_block).unwrap());
        assert_eq!(store.depth(), 2);
    }

    #[test]
    fn utxo_rearrange_finds_genesis_coinbase_output() {
        let (_dir, store) = temp_store();
        mine_genesis(&store, &[3u8; 20]).unwrap();
        store.rearrange_utxo().unwrap();
        let balance = store.balance(&[3u8; 20]).unwrap();
        assert_eq!(balance, tarn_core::constants::SUBSIDY);
    }

    #[test]
    fn find_spendable_early_exits_once_sum_meets_need() {
        let (_dir, store) = temp_store();
        mine_genesis(&store, &[4u8; 20]).unwrap();
        store.rearrange_utxo().unwrap();
        let (sum, selected) = store.find_spendable(&[4u8; 20], tarn_core::constants::SUBSIDY).unwrap();
        assert_eq!(sum, tarn_core::constants::SUBSIDY);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn verify_inputs_rejects_unknown_reference() {
        let (_dir, store) = temp_store();
        mine_genesis(&store, &[5u8; 20]).unwrap();
        store.rearrange_utxo().unwrap();
        let bogus_input = TxIn {
            prev_tx_id: [0xFF; 32],
            prev_out_index: 0,
            signature: Vec::new(),
            public_key: Vec::new(),
        };
        assert!(!store.verify_inputs(&[bogus_input]).unwrap());
    }
}
