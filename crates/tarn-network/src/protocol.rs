//! The wire envelope and the command tags carried inside it.

use serde::{Deserialize, Serialize};

pub const CMD_FW_HASH_LIST: &str = "FW_HASH_LIST";
pub const CMD_REQ_DEPTH: &str = "REQ_DEPTH";
pub const CMD_REQ_BLOCK: &str = "REQ_BLOCK";
pub const CMD_REQ_HEADER: &str = "REQ_HEADER";
pub const CMD_REQ_PRF: &str = "REQ_PRF";
pub const CMD_PRINT_CHAIN: &str = "PRINT_CHAIN";
pub const CMD_ADD_TX: &str = "ADD_TX";

pub const CMD_RES_DEPTH: &str = "RES_DEPTH";
pub const CMD_RES_BLOCK: &str = "RES_BLOCK";
pub const CMD_RES_HEADER: &str = "RES_HEADER";
pub const CMD_RES_PRF: &str = "RES_PRF";
pub const CMD_RES_TX: &str = "RES_TX";

/// The node identity carried in an envelope's `source` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceNode {
    pub address: String,
}

/// The message envelope exchanged over every connection: exactly one is
/// sent, and at most one response envelope is read back, per connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub cmd: String,
    pub data: Vec<u8>,
    pub source: SourceNode,
}

impl Envelope {
    pub fn new(cmd: &str, data: Vec<u8>, source_address: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            data,
            source: SourceNode {
                address: source_address.to_string(),
            },
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("envelope serialization cannot fail")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
