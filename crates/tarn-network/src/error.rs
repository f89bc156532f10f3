use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to connect to peer {0}")]
    Unreachable(String),

    #[error("peer connection timed out")]
    Timeout,

    #[error("i/o error talking to peer: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("peer's shared-prefix header diverges from ours at depth {0}")]
    PrefixDivergence(u64),
}
