//! Protocol-wide constants.

/// Number of leading zero bits a block hash must have against the target.
pub const DIFFICULTY: u32 = 16;

/// Subsidy paid to the miner of a block via its coinbase output.
pub const SUBSIDY: u64 = 25;

/// Address version byte (mirrors Bitcoin's mainnet P2PKH version).
pub const NETWORK_VERSION: u8 = 0x00;

/// Length in bytes of the address checksum suffix.
pub const ADDR_CHECKSUM_LEN: usize = 4;

/// Length in bytes of a RIPEMD-160 public key hash.
pub const PUBKEY_HASH_LEN: usize = 20;

/// Base58 alphabet used throughout the codec (excludes 0, O, I, l).
pub const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Upper bound on the PoW nonce search, matching `math.MaxInt64` in the source tool.
pub const MAX_NONCE: i64 = i64::MAX;
