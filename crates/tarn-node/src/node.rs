//! Construction, startup, and shutdown glue for a running node.

use std::sync::Arc;

use tarn_core::crypto;
use tarn_core::transaction::Transaction;
use tarn_network::protocol::{Envelope, CMD_FW_HASH_LIST};
use tarn_network::sync::sync_with_neighbors;
use tarn_wallet::Wallet;
use tracing::{error, info, warn};

use crate::config::NodeConfig;
use crate::error::StoreError;
use crate::server;
use crate::storage::{mine_genesis, ChainStore};

/// A running node: its configuration, durable store, and (if configured) a
/// wallet used to receive mining subsidies.
pub struct Node {
    pub config: NodeConfig,
    pub store: ChainStore,
    pub wallet: Option<Wallet>,
}

impl Node {
    /// Opens the store at `config.store_path()` (initializing it with a
    /// mined genesis block if the path doesn't exist yet), loads the
    /// configured wallet, and returns the assembled node.
    pub fn new(config: NodeConfig) -> Result<Self, StoreError> {
        let path = config.store_path();
        let store = if path.exists() {
            ChainStore::open(&path)?
        } else {
            ChainStore::init(&path)?
        };

        let wallet = config
            .wallet
            .as_ref()
            .and_then(|w| Wallet::from_file(w).ok());

        if store.depth() == 0 {
            let pubkey_hash = wallet
                .as_ref()
                .map(|w| crypto::validate_address(w.address()).unwrap_or([0u8; 20]))
                .unwrap_or([0u8; 20]);
            info!("store is empty, mining genesis block");
            mine_genesis(&store, &pubkey_hash)?;
        }
        store.rearrange_utxo()?;

        Ok(Self {
            config,
            store,
            wallet,
        })
    }

    /// Runs the initial synchronization pass against every configured
    /// neighbor, then serves the TCP listener until the process exits.
    pub async fn run(self: Arc<Self>) {
        match sync_with_neighbors(
            &self.config.local_address,
            &self.config.neighbor_addresses,
            &self.store,
        )
        .await
        {
            Ok(pulled) => info!(pulled, "initial sync complete"),
            Err(e) => warn!(error = %e, "initial sync aborted"),
        }
        if let Err(e) = self.store.rearrange_utxo() {
            warn!(error = %e, "failed to rebuild utxo index after sync");
        }

        if let Err(e) = server::run(&self.config.local_address.clone(), self).await {
            error!(error = %e, "server exited with error");
        }
    }

    /// Re-runs sync against a single peer that just advertised a new tip.
    pub async fn sync_with(&self, peer_addr: &str) {
        match tarn_network::sync::sync_with_peer(&self.config.local_address, peer_addr, &self.store).await {
            Ok(pulled) if pulled > 0 => {
                info!(peer = peer_addr, pulled, "resynced after peer notice");
                self.store.rearrange_utxo().ok();
            }
            Ok(_) => {}
            Err(e) => warn!(peer = peer_addr, error = %e, "resync after peer notice failed"),
        }
    }

    /// Validates an incoming transaction, mines a block for it paired with
    /// a fresh coinbase, appends it, and fans the new tip out to neighbors.
    pub async fn handle_add_tx(&self, tx_bytes: &[u8]) -> Result<bool, StoreError> {
        let tx = match Transaction::from_bytes(tx_bytes) {
            Ok(tx) => tx,
            Err(_) => return Ok(false),
        };

        if tx.verify_signature().is_err() {
            return Ok(false);
        }
        if !self.store.verify_inputs(&tx.inputs)? {
            return Ok(false);
        }

        let mut prev_outputs = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            match self.store.find_output(&input.prev_tx_id, input.prev_out_index)? {
                Some(out) => prev_outputs.push(out),
                None => return Ok(false),
            }
        }
        if tx.verify_values(&prev_outputs).is_err() {
            return Ok(false);
        }

        let miner_pubkey_hash = self
            .wallet
            .as_ref()
            .map(|w| crypto::validate_address(w.address()).unwrap_or([0u8; 20]))
            .unwrap_or([0u8; 20]);

        let tip = self.store.tip()?;
        let block = server::build_candidate_block(&tip, tx, &miner_pubkey_hash);
        let appended = self.store.append(block)?;
        if appended {
            self.store.update_utxo(&self.store.tip()?.expect("just appended"))?;
            self.fan_out_tip().await;
        }
        Ok(appended)
    }

    async fn fan_out_tip(&self) {
        let hashes: Vec<Vec<u8>> = self
            .store
            .iterate()
            .into_iter()
            .flatten()
            .filter_map(|b| b.ok())
            .map(|b| b.header.hash.to_vec())
            .collect();
        let data = serde_json::to_vec(&hashes).unwrap_or_default();
        for neighbor in &self.config.neighbor_addresses {
            let envelope = Envelope::new(CMD_FW_HASH_LIST, data.clone(), &self.config.local_address);
            if let Err(e) = tarn_network::client::send_notice(neighbor, &envelope).await {
                warn!(peer = neighbor, error = %e, "failed to forward new tip");
            }
        }
    }
}
