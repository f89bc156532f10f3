//! A minimal keypair-and-address wallet, persisted as the external JSON
//! wallet file consumed by [`tarn_node::config::NodeConfig`].

pub mod error;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tarn_core::crypto::KeyPair;

use error::WalletError;

/// An in-memory wallet: a keypair plus its derived address.
pub struct Wallet {
    keypair: KeyPair,
    address: String,
}

/// On-disk JSON representation of a [`Wallet`], matching the external
/// wallet file schema: `{private_key, public_key, address}`, all hex except
/// `address` which is base58check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletFile {
    pub private_key: String,
    pub public_key: String,
    pub address: String,
}

impl Wallet {
    /// Generates a fresh wallet with a new random keypair.
    pub fn generate() -> Self {
        let keypair = KeyPair::generate();
        let address = keypair.address();
        Self { keypair, address }
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn to_file(&self) -> WalletFile {
        WalletFile {
            private_key: hex::encode(self.keypair.private_scalar()),
            public_key: hex::encode(self.keypair.public_key_bytes()),
            address: self.address.clone(),
        }
    }

    pub fn from_file(file: &WalletFile) -> Result<Self, WalletError> {
        let scalar = hex::decode(&file.private_key)
            .map_err(|_| WalletError::BadKey("private_key is not valid hex"))?;
        let keypair = KeyPair::from_private_scalar(&scalar)?;
        Ok(Self {
            keypair,
            address: file.address.clone(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let json = serde_json::to_vec_pretty(&self.to_file())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let bytes = std::fs::read(path)?;
        let file: WalletFile = serde_json::from_slice(&bytes)?;
        Self::from_file(&file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_wallet_address_matches_keypair_address() {
        let wallet = Wallet::generate();
        assert_eq!(wallet.address(), wallet.keypair().address());
    }

    #[test]
    fn wallet_round_trips_through_file() {
        let wallet = Wallet::generate();
        let file = wallet.to_file();
        let restored = Wallet::from_file(&file).unwrap();
        assert_eq!(restored.address(), wallet.address());
        assert_eq!(
            restored.keypair().public_key_bytes(),
            wallet.keypair().public_key_bytes()
        );
    }

    #[test]
    fn wallet_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let wallet = Wallet::generate();
        wallet.save(&path).unwrap();
        let loaded = Wallet::load(&path).unwrap();
        assert_eq!(loaded.address(), wallet.address());
    }
}
