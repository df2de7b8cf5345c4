// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One-shot TCP request/reply exchange.
//!
//! Each request opens a fresh connection, writes the packet and collects
//! bytes until one of:
//!
//! - no byte arrives for the idle timeout after the last chunk (reply done),
//! - the peer closes the connection (reply done, possibly empty),
//! - the overall timeout elapses ([`TransportError::Timeout`]),
//! - a socket error occurs ([`TransportError::Io`]).
//!
//! The stream and both timers are owned by the call, so every exit path
//! releases them exactly once.

use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

/// Quiet period after the last received chunk that ends a reply.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(200);

/// Upper bound on a whole exchange, connect included.
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_millis(1500);

const READ_CHUNK: usize = 1024;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport timeout: no complete reply within {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Idle and overall bounds of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub idle: Duration,
    pub overall: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            idle: DEFAULT_IDLE_TIMEOUT,
            overall: DEFAULT_OVERALL_TIMEOUT,
        }
    }
}

/// Device endpoint plus exchange bounds.
#[derive(Debug, Clone)]
pub struct Session {
    host: String,
    port: u16,
    timeouts: Timeouts,
}

impl Session {
    pub fn new(host: impl Into<String>, port: u16, timeouts: Timeouts) -> Self {
        Self {
            host: host.into(),
            port,
            timeouts,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Perform one exchange against this session's endpoint.
    pub async fn request(&self, packet: &[u8]) -> Result<String, TransportError> {
        request(&self.host, self.port, packet, self.timeouts).await
    }
}

/// Send `packet` on a fresh connection and return the reply text.
///
/// An empty string means the peer closed without sending anything; it is a
/// successful outcome distinct from a timeout or socket error.
pub async fn request(
    host: &str,
    port: u16,
    packet: &[u8],
    timeouts: Timeouts,
) -> Result<String, TransportError> {
    let started = Instant::now();
    let result = tokio::time::timeout(timeouts.overall, exchange(host, port, packet, timeouts.idle))
        .await
        .unwrap_or(Err(TransportError::Timeout(timeouts.overall)));

    trace!(
        "{}:{} exchange finished in {:?} ({})",
        host,
        port,
        started.elapsed(),
        if result.is_ok() { "ok" } else { "failed" }
    );
    result
}

async fn exchange(
    host: &str,
    port: u16,
    packet: &[u8],
    idle: Duration,
) -> Result<String, TransportError> {
    let mut stream = TcpStream::connect((host, port)).await?;
    stream.write_all(packet).await?;
    stream.flush().await?;
    trace!("-> {}", String::from_utf8_lossy(packet).trim_end());

    let mut received = Vec::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        // The idle window only starts once the device has begun replying.
        let read = if received.is_empty() {
            stream.read(&mut buf).await
        } else {
            match tokio::time::timeout(idle, stream.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => break,
            }
        };

        match read? {
            0 => break,
            n => received.extend_from_slice(&buf[..n]),
        }
    }

    let reply = ascii_text(&received);
    trace!("<- {}", reply.trim_end());
    Ok(reply)
}

/// Map each byte to one character.
fn ascii_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
