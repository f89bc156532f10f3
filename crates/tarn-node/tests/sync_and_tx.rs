//! Integration tests exercising `ChainStore`, the static-neighbor sync
//! loop, and `Node::handle_add_tx` together, against real RocksDB stores
//! and (where the scenario needs a peer to talk to) a real TCP listener.

use std::sync::Arc;

use tarn_core::constants::SUBSIDY;
use tarn_core::crypto::{self, KeyPair};
use tarn_core::transaction::{Transaction, TxIn, TxOut};
use tarn_network::error::NetworkError;
use tarn_network::sync::sync_with_peer;
use tarn_node::config::NodeConfig;
use tarn_node::node::Node;
use tarn_node::storage::{mine_genesis, ChainStore};

fn store_at(root: &std::path::Path) -> ChainStore {
    ChainStore::init(&root.join("chaindata")).unwrap()
}

fn config_for(dir: &tempfile::TempDir, local_address: &str, neighbors: Vec<String>) -> NodeConfig {
    NodeConfig {
        data_dir: dir.path().to_path_buf(),
        local_address: local_address.to_string(),
        neighbor_addresses: neighbors,
        wallet: None,
        log_level: "error".to_string(),
    }
}

// ----------------------------------------------------------------------
// Scenario: two-node sync convergence (§8 scenario 4)
//
// A peer two blocks ahead of a fresh local store, sharing the same
// genesis, must bring the local store up to the peer's tip.
// ----------------------------------------------------------------------
#[tokio::test]
async fn two_node_sync_pulls_peer_ahead_blocks() {
    let genesis_dir = tempfile::tempdir().unwrap();
    let genesis_store = store_at(genesis_dir.path());
    let genesis = mine_genesis(&genesis_store, &[7u8; 20]).unwrap();

    let local_dir = tempfile::tempdir().unwrap();
    let local_store = store_at(local_dir.path());
    local_store.append(genesis.clone()).unwrap();

    let peer_dir = tempfile::tempdir().unwrap();
    let peer_store = store_at(peer_dir.path());
    peer_store.append(genesis.clone()).unwrap();

    // Peer advances two more blocks beyond the shared genesis.
    let mut prev = genesis.clone();
    for _ in 0..2 {
        let coinbase = Transaction::new_coinbase(&[8u8; 20], SUBSIDY);
        let mut header = tarn_core::types::Header {
            prev_block_hash: prev.header.hash.to_vec(),
            hash: [0u8; 32],
            timestamp: prev.header.timestamp + 1,
            depth: prev.header.depth + 1,
            nonce: 0,
        };
        let block = tarn_core::types::Block {
            header: header.clone(),
            transactions: vec![coinbase],
        };
        let tx_bytes = block.transactions_bytes();
        tarn_core::pow::mine(&mut header, &tx_bytes).unwrap();
        let mined = tarn_core::types::Block {
            header,
            transactions: block.transactions,
        };
        assert!(peer_store.append(mined.clone()).unwrap());
        prev = mined;
    }
    peer_store.rearrange_utxo().unwrap();

    let peer_addr = "127.0.0.1:19511";
    let peer_config = config_for(&peer_dir, peer_addr, Vec::new());
    let peer_node = Arc::new(Node::new(peer_config).unwrap());
    assert_eq!(peer_node.store.depth(), 3);
    tokio::spawn(tarn_node::server::run(peer_addr, peer_node.clone()));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(local_store.depth(), 1);
    let pulled = sync_with_peer("127.0.0.1:19510", peer_addr, &local_store)
        .await
        .unwrap();
    assert_eq!(pulled, 2);
    assert_eq!(local_store.depth(), 3);
    assert_eq!(local_store.tip_hash(), peer_store.tip_hash());
}

// ----------------------------------------------------------------------
// Scenario: prefix-divergence abort (§8 scenario 5)
//
// A peer whose chain shares no common genesis with the local store must
// cause `sync_with_peer` to abort with `PrefixDivergence` rather than
// rewriting the local chain.
// ----------------------------------------------------------------------
#[tokio::test]
async fn sync_aborts_on_shared_prefix_divergence() {
    let local_dir = tempfile::tempdir().unwrap();
    let local_store = store_at(local_dir.path());
    let local_genesis = mine_genesis(&local_store, &[1u8; 20]).unwrap();

    let peer_dir = tempfile::tempdir().unwrap();
    let peer_store = store_at(peer_dir.path());
    // Different miner pubkey hash guarantees a different genesis hash.
    mine_genesis(&peer_store, &[2u8; 20]).unwrap();
    let coinbase = Transaction::new_coinbase(&[2u8; 20], SUBSIDY);
    let peer_tip = peer_store.tip().unwrap().unwrap();
    let mut header = tarn_core::types::Header {
        prev_block_hash: peer_tip.header.hash.to_vec(),
        hash: [0u8; 32],
        timestamp: peer_tip.header.timestamp + 1,
        depth: peer_tip.header.depth + 1,
        nonce: 0,
    };
    let block = tarn_core::types::Block {
        header: header.clone(),
        transactions: vec![coinbase],
    };
    let tx_bytes = block.transactions_bytes();
    tarn_core::pow::mine(&mut header, &tx_bytes).unwrap();
    peer_store
        .append(tarn_core::types::Block {
            header,
            transactions: block.transactions,
        })
        .unwrap();
    peer_store.rearrange_utxo().unwrap();

    let peer_addr = "127.0.0.1:19521";
    let peer_config = config_for(&peer_dir, peer_addr, Vec::new());
    let peer_node = Arc::new(Node::new(peer_config).unwrap());
    tokio::spawn(tarn_node::server::run(peer_addr, peer_node.clone()));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let result = sync_with_peer("127.0.0.1:19520", peer_addr, &local_store).await;
    assert!(matches!(result, Err(NetworkError::PrefixDivergence(1))));

    // Local chain must be untouched.
    assert_eq!(local_store.depth(), 1);
    assert_eq!(local_store.tip_hash(), local_genesis.header.hash.to_vec());
}

// ----------------------------------------------------------------------
// Scenario: ADD_TX round trip (§8 scenario 6)
//
// A signed spend of a real coinbase output, submitted through
// `Node::handle_add_tx`, must be mined into a new block and the UTXO
// index must reflect the spend and its change output.
// ----------------------------------------------------------------------
#[tokio::test]
async fn add_tx_spends_coinbase_and_updates_utxo_index() {
    let sender = KeyPair::generate();
    let sender_hash = crypto::validate_address(&sender.address()).unwrap();
    let receiver = KeyPair::generate();
    let receiver_hash = crypto::validate_address(&receiver.address()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = store_at(dir.path());
    let genesis = mine_genesis(&store, &sender_hash).unwrap();
    store.rearrange_utxo().unwrap();
    let coinbase_tx_id = genesis.transactions[0].id;

    let spend_value = 10u64;
    let change_value = SUBSIDY - spend_value;
    let mut tx = Transaction {
        id: [0u8; 32],
        inputs: vec![TxIn {
            prev_tx_id: coinbase_tx_id,
            prev_out_index: 0,
            signature: Vec::new(),
            public_key: Vec::new(),
        }],
        outputs: vec![
            TxOut {
                value: spend_value,
                pubkey_hash: receiver_hash,
            },
            TxOut {
                value: change_value,
                pubkey_hash: sender_hash,
            },
        ],
    };
    tx.sign(&sender);
    tx.id = tx.hash();
    assert!(tx.verify_signature().is_ok());

    let config = config_for(&dir, "127.0.0.1:19530", Vec::new());
    let node = Node::new(config).unwrap();
    assert_eq!(node.store.depth(), 1);

    let accepted = node.handle_add_tx(&tx.to_bytes()).await.unwrap();
    assert!(accepted);
    assert_eq!(node.store.depth(), 2);

    assert_eq!(node.store.balance(&receiver_hash).unwrap(), spend_value);
    assert_eq!(node.store.balance(&sender_hash).unwrap(), change_value);
    assert!(!node.store.verify_inputs(&tx.inputs).unwrap());
}
