//! Stream-socket probe
//!
//! Connects, sends the literal bytes `ping` and reads one JSON object of at
//! most 2048 bytes. Timeouts are enforced by the caller.

use super::{async_trait, Probe, ProbeResponse};
use crate::error::ProbeError;
use crate::models::ServerEndpoint;
use serde::de::IgnoredAny;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Request payload sent to every server
pub const PROBE_REQUEST: &[u8] = b"ping";

/// Upper bound on the response size
pub const MAX_RESPONSE_BYTES: usize = 2048;

/// Probe over a plain TCP connection
#[derive(Debug, Clone)]
pub struct TcpProbe {
    max_response_bytes: usize,
}

impl TcpProbe {
    pub fn new() -> Self {
        Self {
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }

    pub fn with_max_response_bytes(max_response_bytes: usize) -> Self {
        Self {
            max_response_bytes: max_response_bytes.max(1),
        }
    }

    /// Read until EOF, a full buffer, or a complete JSON document
    async fn read_response(&self, stream: &mut TcpStream) -> Result<Vec<u8>, ProbeError> {
        let mut buf = vec![0u8; self.max_response_bytes];
        let mut filled = 0;

        while filled < buf.len() {
            let n = stream
                .read(&mut buf[filled..])
                .await
                .map_err(ProbeError::Io)?;
            if n == 0 {
                break;
            }
            filled += n;

            // Servers may keep the connection open after answering
            if serde_json::from_slice::<IgnoredAny>(&buf[..filled]).is_ok() {
                break;
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, endpoint: &ServerEndpoint) -> Result<ProbeResponse, ProbeError> {
        let mut stream = TcpStream::connect(endpoint.address())
            .await
            .map_err(ProbeError::Connect)?;

        stream
            .write_all(PROBE_REQUEST)
            .await
            .map_err(ProbeError::Io)?;

        let body = self.read_response(&mut stream).await?;
        if body.is_empty() {
            return Err(ProbeError::EmptyResponse);
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
