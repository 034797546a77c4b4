//! Per-connection request handling.
//!
//! Each connection gets exactly one exchange:
//!
//! 1. Read up to [`READ_CAPACITY`] bytes, bounded by the read timeout
//! 2. Transform the text and append the trailer in the same buffer
//! 3. Sleep for the response delay
//! 4. Write the buffer back in one go
//!
//! The connection is closed when the handler returns, whatever the
//! outcome. Only the read is bounded by a deadline; the delay and the
//! write are not.

use crate::config::Config;
use crate::transform::Transform;
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Maximum number of bytes read from a connection
pub const READ_CAPACITY: usize = 1024;

/// Text appended to every response
pub const DEFAULT_TRAILER: &str = "\nServed by mirrorline";

/// Default time allowed for the client to send its data
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Default pause before each response
pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_secs(4);

/// Settings shared read-only by every connection handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub read_timeout: Duration,
    pub response_delay: Duration,
    pub trailer: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            response_delay: DEFAULT_RESPONSE_DELAY,
            trailer: DEFAULT_TRAILER.to_string(),
        }
    }
}

impl From<&Config> for HandlerConfig {
    fn from(config: &Config) -> Self {
        Self {
            read_timeout: config.read_timeout,
            response_delay: config.response_delay,
            trailer: config.trailer.clone(),
        }
    }
}

/// Result of the bounded read.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes read; zero means the client closed its side without sending
    Data(usize),
    /// The read deadline passed first
    Timeout,
    /// The peer reset or aborted the connection
    Closed(io::Error),
    /// Any other I/O failure
    Failed(io::Error),
}

/// Result of writing the response.
#[derive(Debug)]
pub enum WriteOutcome {
    Written(usize),
    Closed(io::Error),
    Failed(io::Error),
}

/// How a connection ended, reported back to the accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A response of this many bytes was written
    Responded(usize),
    /// Nothing was sent because the read did not succeed
    ReadAborted,
    /// The response could not be written
    WriteAborted,
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

/// Perform a single read that must finish before `deadline`.
pub async fn read_with_deadline<R>(reader: &mut R, buf: &mut [u8], deadline: Instant) -> ReadOutcome
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout_at(deadline, reader.read(buf)).await {
        Err(_) => ReadOutcome::Timeout,
        Ok(Ok(n)) => ReadOutcome::Data(n),
        Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => ReadOutcome::Timeout,
        Ok(Err(e)) if is_disconnect(&e) => ReadOutcome::Closed(e),
        Ok(Err(e)) => ReadOutcome::Failed(e),
    }
}

/// Write the whole buffer.
pub async fn write_response<W>(writer: &mut W, buf: &[u8]) -> WriteOutcome
where
    W: AsyncWrite + Unpin,
{
    let result = match writer.write_all(buf).await {
        Ok(()) => writer.flush().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => WriteOutcome::Written(buf.len()),
        Err(e) if is_disconnect(&e) => WriteOutcome::Closed(e),
        Err(e) => WriteOutcome::Failed(e),
    }
}

/// Overwrite the first `read_len` bytes of `buffer` with their transformed
/// text, then place `trailer` right after them.
///
/// The result is always `read_len + trailer.len()` bytes. Transformed text
/// longer than the input is cut at `read_len`, even inside a character.
/// Shorter text leaves the remaining input bytes where they were. Bytes
/// that are not valid UTF-8 are decoded as U+FFFD before transforming.
pub fn rewrite_in_place(
    buffer: &mut BytesMut,
    read_len: usize,
    transform: &dyn Transform,
    trailer: &str,
) {
    let text = transform.apply(&String::from_utf8_lossy(&buffer[..read_len]));
    let fitted = text.len().min(read_len);

    buffer[..fitted].copy_from_slice(&text.as_bytes()[..fitted]);
    buffer.truncate(read_len);
    buffer.extend_from_slice(trailer.as_bytes());
}

/// Build a complete response for `input` without a connection.
pub fn build_response(input: &[u8], transform: &dyn Transform, trailer: &str) -> BytesMut {
    let mut buffer = BytesMut::with_capacity(READ_CAPACITY + trailer.len());
    buffer.extend_from_slice(&input[..input.len().min(READ_CAPACITY)]);
    let read_len = buffer.len();
    rewrite_in_place(&mut buffer, read_len, transform, trailer);
    buffer
}

/// Handle one client connection from accept to close.
pub async fn handle_connection<S>(
    mut stream: S,
    conn_id: u64,
    config: &HandlerConfig,
    transform: &dyn Transform,
) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(conn_id, "Handling client connection");

    let deadline = Instant::now() + config.read_timeout;

    // Room for the trailer so appending never reallocates
    let mut buffer = BytesMut::with_capacity(READ_CAPACITY + config.trailer.len());
    buffer.resize(READ_CAPACITY, 0);

    let bytes_read = match read_with_deadline(&mut stream, &mut buffer[..], deadline).await {
        ReadOutcome::Data(n) => n,
        ReadOutcome::Timeout => {
            warn!(conn_id, timeout = ?config.read_timeout, "Timed out waiting for client data");
            return Outcome::ReadAborted;
        }
        ReadOutcome::Closed(e) => {
            warn!(conn_id, error = %e, "Client closed the connection before sending");
            return Outcome::ReadAborted;
        }
        ReadOutcome::Failed(e) => {
            warn!(conn_id, error = %e, "Failed to read from client");
            return Outcome::ReadAborted;
        }
    };

    info!(
        conn_id,
        bytes = bytes_read,
        data = %String::from_utf8_lossy(&buffer[..bytes_read]),
        "Read client data"
    );

    rewrite_in_place(&mut buffer, bytes_read, transform, &config.trailer);
    debug!(
        conn_id,
        response = %String::from_utf8_lossy(&buffer),
        "Transformed input and appended trailer"
    );

    debug!(conn_id, delay = ?config.response_delay, "Delaying response");
    tokio::time::sleep(config.response_delay).await;

    info!(conn_id, bytes = buffer.len(), "Sending a response back");
    match write_response(&mut stream, &buffer).await {
        WriteOutcome::Written(n) => {
            info!(conn_id, bytes = n, "Wrote response");
            Outcome::Responded(n)
        }
        WriteOutcome::Closed(e) => {
            debug!(conn_id, error = %e, "Client went away before the response");
            Outcome::WriteAborted
        }
        WriteOutcome::Failed(e) => {
            warn!(conn_id, error = %e, "Failed to write response");
            Outcome::WriteAborted
        }
    }
}
