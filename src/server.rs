//! TCP server for mirrorline connections.
//!
//! Binds the listening socket, accepts connections in a loop and hands
//! each one to its own task. Accept errors are logged and never stop the
//! loop; failures inside a connection stay inside that connection.

use crate::config::Config;
use crate::handler::{handle_connection, HandlerConfig};
use crate::transform::{ReverseTitle, Transform};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Pending-connection backlog for the listening socket
const LISTEN_BACKLOG: i32 = 1024;

/// Server instance
pub struct Server {
    listener: TcpListener,
    handler: Arc<HandlerConfig>,
    transform: Arc<dyn Transform>,
    conn_ids: ConnectionIds,
}

impl Server {
    /// Bind the listening socket described by `config`.
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        let address = config.bind_address();
        let addr = tokio::net::lookup_host(&address)
            .await
            .map_err(|e| ServerError::Resolve(address.clone(), e))?
            .next()
            .ok_or_else(|| {
                ServerError::Resolve(
                    address.clone(),
                    io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
                )
            })?;

        let listener = create_listener(addr)
            .and_then(TcpListener::from_std)
            .map_err(|e| ServerError::Bind(addr, e))?;

        Ok(Server {
            listener,
            handler: Arc::new(HandlerConfig::from(config)),
            transform: Arc::new(ReverseTitle),
            conn_ids: ConnectionIds::default(),
        })
    }

    /// Replace the text transform applied to every connection.
    pub fn with_transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = transform;
        self
    }

    /// Address the server is actually listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the process is stopped.
    pub async fn run(mut self) {
        match self.listener.local_addr() {
            Ok(addr) => info!(address = %addr, "Started a TCP server"),
            Err(e) => error!(error = %e, "Failed to read listening address"),
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let conn_id = self.conn_ids.next_id();
                    info!(conn_id, peer = %peer, "Accepted connection");

                    let handler = Arc::clone(&self.handler);
                    let transform = Arc::clone(&self.transform);

                    tokio::spawn(async move {
                        let outcome =
                            handle_connection(stream, conn_id, &handler, transform.as_ref()).await;
                        debug!(conn_id, ?outcome, "Connection closed");
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Sequential connection identifiers, starting at 1.
#[derive(Debug, Default)]
struct ConnectionIds {
    last: u64,
}

impl ConnectionIds {
    fn next_id(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}

/// Create a non-blocking listening socket with address reuse enabled.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

/// Startup errors; all of them are fatal.
#[derive(Debug)]
pub enum ServerError {
    Resolve(String, io::Error),
    Bind(SocketAddr, io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Resolve(address, e) => {
                write!(f, "Failed to resolve '{}': {}", address, e)
            }
            ServerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
        }
    }
}

impl std::error::Error for ServerError {}
