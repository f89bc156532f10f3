//! Bounded-timeout TCP helpers for talking to a neighbor node.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::warn;

use crate::error::NetworkError;
use crate::protocol::Envelope;

const DIAL_TIMEOUT: Duration = Duration::from_secs(3);
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Dials `addr`, writes `request`, and reads back one response envelope.
/// On any transport failure the peer is logged and skipped — callers treat
/// `Err` as "this peer is unreachable right now", not a fatal condition.
pub async fn send_request(addr: &str, request: &Envelope) -> Result<Envelope, NetworkError> {
    let mut conn = timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| NetworkError::Timeout)?
        .map_err(|e| {
            warn!(peer = addr, error = %e, "neighbor unreachable");
            NetworkError::Unreachable(addr.to_string())
        })?;

    conn.write_all(&request.to_bytes()).await?;
    conn.shutdown().await.ok();

    let mut buf = Vec::new();
    timeout(READ_TIMEOUT, conn.read_to_end(&mut buf))
        .await
        .map_err(|_| NetworkError::Timeout)??;

    Envelope::from_bytes(&buf).map_err(NetworkError::from)
}

/// Fire-and-forget send, used for `FW_HASH_LIST` fan-out where no response
/// is expected.
pub async fn send_notice(addr: &str, request: &Envelope) -> Result<(), NetworkError> {
    let mut conn = timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| NetworkError::Timeout)?
        .map_err(|e| {
            warn!(peer = addr, error = %e, "neighbor unreachable");
            NetworkError::Unreachable(addr.to_string())
        })?;
    conn.write_all(&request.to_bytes()).await?;
    conn.shutdown().await.ok();
    Ok(())
}
