// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One fetch cycle: connect, read until the server closes, decode.

use crate::protocol::{decode, DecodeError, PartialTelemetry};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Fetch cycle errors.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connection refused by {0}")]
    Refused(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("payload exceeds {0} bytes")]
    TooLarge(usize),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl FetchError {
    /// Refusal is how a server that reached its limit shows up.
    pub fn is_server_exit(&self) -> bool {
        matches!(self, Self::Refused(_))
    }
}

/// Read one raw payload from `addr`.
///
/// Connect and read share a single `timeout`. At most `max_payload` bytes are
/// accepted.
pub async fn fetch_payload(
    addr: &str,
    timeout: Duration,
    max_payload: usize,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(timeout, read_until_close(addr, max_payload))
        .await
        .map_err(|_| FetchError::Timeout(timeout))?
}

async fn read_until_close(addr: &str, max_payload: usize) -> Result<Vec<u8>, FetchError> {
    let stream = TcpStream::connect(addr).await.map_err(|source| {
        if source.kind() == io::ErrorKind::ConnectionRefused {
            FetchError::Refused(addr.to_string())
        } else {
            FetchError::Connect {
                addr: addr.to_string(),
                source,
            }
        }
    })?;

    let mut buf = Vec::with_capacity(max_payload.min(4096));
    // One extra byte distinguishes "exactly at the limit" from "over it".
    stream
        .take(max_payload as u64 + 1)
        .read_to_end(&mut buf)
        .await?;

    if buf.len() > max_payload {
        return Err(FetchError::TooLarge(max_payload));
    }
    Ok(buf)
}

/// Run a full fetch cycle and decode the payload.
pub async fn fetch_telemetry(
    addr: &str,
    timeout: Duration,
    max_payload: usize,
) -> Result<PartialTelemetry, FetchError> {
    let payload = fetch_payload(addr, timeout, max_payload).await?;
    Ok(decode(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn one_shot_server(payload: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(payload).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        addr
    }

    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn test_fetch_reads_until_close() {
        let addr = one_shot_server(br#"{"Temperature_C":"41.0"}"#).await;
        let telemetry = fetch_telemetry(&addr, Duration::from_secs(1), 4096)
            .await
            .unwrap();
        assert_eq!(telemetry.temperature_c.as_deref(), Some("41.0"));
    }

    #[tokio::test]
    async fn test_refused() {
        let addr = closed_port().await;
        let err = fetch_payload(&addr, Duration::from_secs(1), 4096)
            .await
            .unwrap_err();
        assert!(err.is_server_exit(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_timeout_when_server_never_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let err = fetch_payload(&addr, Duration::from_millis(200), 4096)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
        assert!(!err.is_server_exit());
        drop(listener);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_decode_error() {
        let addr = one_shot_server(b"not-json").await;
        let err = fetch_telemetry(&addr, Duration::from_secs(1), 4096)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(DecodeError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let addr = one_shot_server(&[b'x'; 64]).await;
        let err = fetch_payload(&addr, Duration::from_secs(1), 16)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::TooLarge(16)));
    }

    #[tokio::test]
    async fn test_payload_at_limit() {
        let addr = one_shot_server(&[b'x'; 16]).await;
        let payload = fetch_payload(&addr, Duration::from_secs(1), 16)
            .await
            .unwrap();
        assert_eq!(payload.len(), 16);
    }
}
