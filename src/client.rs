//! Companion client for talking to a mirrorline server.
//!
//! Connects, optionally waits, sends one message, half-closes its write
//! side and reads the reply until the server closes the connection.

use crate::config::duration_str;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::info;

/// Config file used by the client binary when `--config` is not given
pub const DEFAULT_CLIENT_CONFIG_FILE: &str = "client-config.json";

/// Message sent when none is configured
pub const DEFAULT_MESSAGE: &str = "Hello from the mirrorline client";

/// Client settings, also the layout of the client config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub server: SocketAddr,
    #[serde(with = "duration_str")]
    pub initial_delay: Duration,
    #[serde(default = "default_message")]
    pub message: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: SocketAddr::from(([127, 0, 0, 1], 7890)),
            initial_delay: Duration::from_secs(6),
            message: default_message(),
        }
    }
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

/// What happened during one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Bytes written to the server
    pub sent: usize,
    /// Bytes received back
    pub received: usize,
    /// The reply, decoded lossily as UTF-8
    pub response: String,
}

/// Run one request/response exchange against `config.server`.
pub async fn exchange(config: &ClientConfig) -> Result<Exchange, ClientError> {
    let mut stream = TcpStream::connect(config.server)
        .await
        .map_err(|e| ClientError::Connect(config.server, e))?;
    info!(server = %config.server, "Connected");

    if !config.initial_delay.is_zero() {
        info!(delay = ?config.initial_delay, "Waiting before sending");
        tokio::time::sleep(config.initial_delay).await;
    }

    info!(message = %config.message, "Sending");
    stream
        .write_all(config.message.as_bytes())
        .await
        .map_err(ClientError::Write)?;
    stream.shutdown().await.map_err(ClientError::Write)?;
    let sent = config.message.len();
    info!(bytes = sent, "Wrote message");

    let mut reply = Vec::new();
    stream
        .read_to_end(&mut reply)
        .await
        .map_err(ClientError::Read)?;

    let response = String::from_utf8_lossy(&reply).into_owned();
    info!(bytes = reply.len(), response = %response, "Received reply");

    Ok(Exchange {
        sent,
        received: reply.len(),
        response,
    })
}

/// Client-side failures
#[derive(Debug)]
pub enum ClientError {
    Connect(SocketAddr, io::Error),
    Write(io::Error),
    Read(io::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Connect(addr, e) => write!(f, "Failed to connect to {}: {}", addr, e),
            ClientError::Write(e) => write!(f, "Failed to send message: {}", e),
            ClientError::Read(e) => write!(f, "Failed to read reply: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}
