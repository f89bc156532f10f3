//! The TCP listener and per-connection command dispatch.

use std::sync::Arc;

use rand::Rng;
use tarn_core::transaction::Transaction;
use tarn_core::types::{Block, Header};
use tarn_network::protocol::{
    Envelope, CMD_ADD_TX, CMD_FW_HASH_LIST, CMD_PRINT_CHAIN, CMD_REQ_BLOCK, CMD_REQ_DEPTH,
    CMD_REQ_HEADER, CMD_REQ_PRF, CMD_RES_BLOCK, CMD_RES_DEPTH, CMD_RES_HEADER, CMD_RES_PRF,
    CMD_RES_TX,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::error::ServerError;
use crate::node::Node;

/// Binds `addr` and serves connections until the process is asked to stop.
pub async fn run(addr: &str, node: Arc<Node>) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "server listening");

    loop {
        let (conn, peer) = listener.accept().await?;
        let node = node.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(conn, node).await {
                warn!(peer = %peer, error = %e, "connection handling failed");
            }
        });
    }
}

async fn handle_connection(mut conn: TcpStream, node: Arc<Node>) -> Result<(), ServerError> {
    let mut buf = Vec::new();
    conn.read_to_end(&mut buf).await?;
    if buf.is_empty() {
        return Ok(());
    }
    let request = Envelope::from_bytes(&buf)?;
    info!(cmd = %request.cmd, source = %request.source.address, "handling request");

    let response = dispatch(&request, &node).await?;
    if let Some(response) = response {
        conn.write_all(&response.to_bytes()).await?;
    }
    Ok(())
}

async fn dispatch(request: &Envelope, node: &Arc<Node>) -> Result<Option<Envelope>, ServerError> {
    let local_addr = node.config.local_address.clone();

    let response = match request.cmd.as_str() {
        CMD_REQ_DEPTH => {
            let depth = node.store.depth();
            Some(Envelope::new(CMD_RES_DEPTH, depth.to_string().into_bytes(), &local_addr))
        }
        CMD_REQ_BLOCK => {
            let depth: u64 = String::from_utf8_lossy(&request.data).parse().unwrap_or(0);
            let block = node.store.get_by_depth(depth)?;
            let data = block.map(|b| b.to_bytes()).unwrap_or_default();
            Some(Envelope::new(CMD_RES_BLOCK, data, &local_addr))
        }
        CMD_REQ_HEADER => {
            let requested = Header::from_bytes(&request.data)?;
            let matches = match node.store.get_by_depth(requested.depth)? {
                Some(local) => local.header == requested,
                None => false,
            };
            let data = if matches { b"true".to_vec() } else { b"false".to_vec() };
            Some(Envelope::new(CMD_RES_HEADER, data, &local_addr))
        }
        CMD_REQ_PRF => {
            let tip_hash = node.store.tip_hash();
            let matches = if tip_hash.len() >= 4 && request.data.len() == 4 {
                let max_offset = tip_hash.len() - 4;
                let offset = rand::thread_rng().gen_range(0..=max_offset);
                tip_hash[offset..offset + 4] == request.data[..]
            } else {
                false
            };
            Some(Envelope::new(
                CMD_RES_PRF,
                vec![matches as u8],
                &local_addr,
            ))
        }
        CMD_PRINT_CHAIN => {
            for block in node.store.iterate()? {
                let block = block?;
                println!(
                    "[depth {}] hash={} prev={} txs={}",
                    block.header.depth,
                    hex::encode(block.header.hash),
                    hex::encode(&block.header.prev_block_hash),
                    block.transactions.len()
                );
            }
            None
        }
        CMD_FW_HASH_LIST => {
            info!(peer = %request.source.address, "peer advertises a new tip, resyncing");
            node.sync_with(&request.source.address).await;
            None
        }
        CMD_ADD_TX => {
            let accepted = node.handle_add_tx(&request.data).await.unwrap_or(false);
            let data = if accepted { b"true".to_vec() } else { b"false".to_vec() };
            Some(Envelope::new(CMD_RES_TX, data, &local_addr))
        }
        other => {
            info!(cmd = other, "unknown command, ignoring");
            None
        }
    };

    Ok(response)
}

/// Builds a block carrying `tx` plus a coinbase to `miner_pubkey_hash`, at
/// the next depth after the current tip, and mines it.
pub fn build_candidate_block(
    tip: &Option<Block>,
    tx: Transaction,
    miner_pubkey_hash: &[u8; 20],
) -> Block {
    let coinbase = Transaction::new_coinbase(miner_pubkey_hash, tarn_core::constants::SUBSIDY);
    let (prev_hash, depth) = match tip {
        Some(tip) => (tip.header.hash.to_vec(), tip.header.depth + 1),
        None => (Vec::new(), 1),
    };
    let mut header = Header {
        prev_block_hash: prev_hash,
        hash: [0; 32],
        timestamp: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        depth,
        nonce: 0,
    };
    let block = Block {
        header: header.clone(),
        transactions: vec![coinbase, tx],
    };
    let tx_bytes = block.transactions_bytes();
    tarn_core::pow::mine(&mut header, &tx_bytes).ok();
    Block {
        header,
        transactions: block.transactions,
    }
}
