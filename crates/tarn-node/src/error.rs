use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store path already exists: {0}")]
    AlreadyExists(String),

    #[error("store path does not exist: {0}")]
    Missing(String),

    #[error("store is locked by another process")]
    Locked,

    #[error("store contains corrupt data: {0}")]
    Corrupt(String),

    #[error("rocksdb error: {0}")]
    Rocks(String),

    #[error(transparent)]
    Codec(#[from] tarn_core::error::CodecError),

    #[error(transparent)]
    Tx(#[from] tarn_core::error::TxError),
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Rocks(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
