//! mirrorline: a TCP server that mirrors text back
//!
//! Every accepted connection gets exactly one exchange:
//! - Read up to 1024 bytes within the read timeout
//! - Reverse the text by characters, then title-case it
//! - Append a fixed trailer
//! - Wait a fixed delay, write the result back and close
//!
//! Connections are handled concurrently, one task each.

pub mod client;
pub mod config;
pub mod handler;
pub mod logging;
pub mod server;
pub mod transform;

pub use config::{Bootstrap, Config, ConfigError};
pub use handler::{HandlerConfig, Outcome, DEFAULT_TRAILER, READ_CAPACITY};
pub use server::{Server, ServerError};
pub use transform::{ReverseTitle, Transform};
