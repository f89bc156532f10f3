//! The static-neighbor synchronization loop: depth probe, shared-prefix
//! header-equality probe, then block pull.
//!
//! `tarn-network` knows nothing about how the chain is stored; callers
//! (`tarn-node`) provide a [`ChainAccess`] implementation over their durable
//! store. This keeps the sync loop's control flow — dial, probe, pull —
//! decoupled from storage, the way `rill-network`'s `SyncManager` is kept
//! decoupled from `rill-node`'s RocksDB-backed store.

use tarn_core::types::{Block, Header};
use tracing::{info, warn};

use crate::client::send_request;
use crate::error::NetworkError;
use crate::protocol::{Envelope, CMD_REQ_BLOCK, CMD_REQ_DEPTH, CMD_REQ_HEADER};

/// Number of full probe/pull rounds attempted against each neighbor per
/// sync invocation.
pub const MAX_ASK_TIME: u32 = 1;

/// What a sync caller needs to expose over its local chain store.
pub trait ChainAccess {
    fn depth(&self) -> u64;
    fn header_at(&self, depth: u64) -> Option<Header>;
    fn append_block(&self, block: Block) -> bool;
}

/// Runs the probe/prefix/pull loop against one neighbor, returning `Ok(n)`
/// with the number of blocks pulled, or an error if the neighbor diverges
/// on the shared prefix (fatal) or is unreachable (recoverable; caller
/// simply moves to the next neighbor).
pub async fn sync_with_peer(
    local_addr: &str,
    peer_addr: &str,
    chain: &impl ChainAccess,
) -> Result<usize, NetworkError> {
    let mut pulled = 0usize;

    for _round in 0..MAX_ASK_TIME {
        let local_depth = chain.depth();

        let depth_req = Envelope::new(CMD_REQ_DEPTH, Vec::new(), local_addr);
        let depth_res = send_request(peer_addr, &depth_req).await?;
        let peer_depth: u64 = String::from_utf8_lossy(&depth_res.data)
            .parse()
            .unwrap_or(0);

        info!(peer = peer_addr, local_depth, peer_depth, "probed neighbor depth");

        let shared = local_depth.min(peer_depth);
        for i in 1..=shared {
            let Some(local_header) = chain.header_at(i) else {
                continue;
            };
            let header_req = Envelope::new(CMD_REQ_HEADER, local_header.to_bytes(), local_addr);
            let header_res = send_request(peer_addr, &header_req).await?;
            let matches = header_res.data == b"true";
            if !matches {
                warn!(peer = peer_addr, depth = i, "shared-prefix header diverges");
                return Err(NetworkError::PrefixDivergence(i));
            }
        }

        if local_depth < peer_depth {
            for i in (local_depth + 1)..=peer_depth {
                let block_req =
                    Envelope::new(CMD_REQ_BLOCK, i.to_string().into_bytes(), local_addr);
                let block_res = send_request(peer_addr, &block_req).await?;
                let block = Block::from_bytes(&block_res.data)
                    .map_err(|_| NetworkError::Unreachable(peer_addr.to_string()))?;
                if chain.append_block(block) {
                    pulled += 1;
                }
            }
        }
    }

    Ok(pulled)
}

/// Runs [`sync_with_peer`] against every neighbor in order, skipping (and
/// logging) any that are unreachable, but propagating a prefix divergence.
pub async fn sync_with_neighbors(
    local_addr: &str,
    neighbors: &[String],
    chain: &impl ChainAccess,
) -> Result<usize, NetworkError> {
    let mut total = 0usize;
    for peer in neighbors {
        match sync_with_peer(local_addr, peer, chain).await {
            Ok(n) => total += n,
            Err(NetworkError::PrefixDivergence(depth)) => {
                return Err(NetworkError::PrefixDivergence(depth));
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "skipping unreachable neighbor");
            }
        }
    }
    Ok(total)
}
