use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("failed to read wallet file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse wallet file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wallet private key is malformed: {0}")]
    BadKey(&'static str),

    #[error(transparent)]
    Crypto(#[from] tarn_core::error::CryptoError),
}
