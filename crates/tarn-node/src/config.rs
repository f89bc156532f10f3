//! Node configuration loaded once from a JSON file at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tarn_wallet::WalletFile;

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAddress {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSection {
    pub local_node: NodeAddress,
    #[serde(default)]
    pub neighbor_nodes: Vec<NodeAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub network: NetworkSection,
    #[serde(default)]
    pub wallet: Option<WalletFile>,
}

/// Fully resolved node configuration, handed to the rest of the node as an
/// immutable value. Mirrors the teacher's `NodeConfig` shape (a `data_dir`
/// plus helper accessors), reshaped to this protocol's JSON schema.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub local_address: String,
    pub neighbor_addresses: Vec<String>,
    pub wallet: Option<WalletFile>,
    pub log_level: String,
}

impl NodeConfig {
    pub fn from_file(path: &Path, data_dir: PathBuf, log_level: String) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        let parsed: ConfigFile = serde_json::from_slice(&bytes)?;
        Ok(Self {
            data_dir,
            local_address: parsed.network.local_node.address,
            neighbor_addresses: parsed
                .network
                .neighbor_nodes
                .into_iter()
                .map(|n| n.address)
                .collect(),
            wallet: parsed.wallet,
            log_level,
        })
    }

    /// Path to the RocksDB chain-store directory.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("chaindata")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses_minimal_network_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"network": {"local_node": {"address": "127.0.0.1:9000"},
                            "neighbor_nodes": [{"address": "127.0.0.1:9001"}]}}"#,
        )
        .unwrap();
        let cfg = NodeConfig::from_file(&path, dir.path().to_path_buf(), "info".into()).unwrap();
        assert_eq!(cfg.local_address, "127.0.0.1:9000");
        assert_eq!(cfg.neighbor_addresses, vec!["127.0.0.1:9001".to_string()]);
        assert!(cfg.wallet.is_none());
    }

    #[test]
    fn config_parses_wallet_section_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"network": {"local_node": {"address": "127.0.0.1:9000"}, "neighbor_nodes": []},
                "wallet": {"private_key": "ab", "public_key": "cd", "address": "abc"}}"#,
        )
        .unwrap();
        let cfg = NodeConfig::from_file(&path, dir.path().to_path_buf(), "info".into()).unwrap();
        assert!(cfg.wallet.is_some());
        assert_eq!(cfg.wallet.unwrap().address, "abc");
    }

    #[test]
    fn missing_config_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(NodeConfig::from_file(&path, dir.path().to_path_buf(), "info".into()).is_err());
    }

    #[test]
    fn store_path_appends_chaindata() {
        let cfg = NodeConfig {
            data_dir: PathBuf::from("/tmp/tarn-test"),
            local_address: "a".into(),
            neighbor_addresses: vec![],
            wallet: None,
            log_level: "info".into(),
        };
        assert_eq!(cfg.store_path(), PathBuf::from("/tmp/tarn-test/chaindata"));
    }
}
