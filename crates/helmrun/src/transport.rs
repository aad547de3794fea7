//! # Transport Abstraction
//!
//! A minimal async interface for moving frames between the bridge halves.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: the transport knows nothing about frames, kinds, or
//!   values. It moves opaque buffers.
//! - **Seam, not surface**: the socket transport and the in-memory test
//!   transport both live behind this trait, so the client pump is tested
//!   without a filesystem.

use std::fmt;

/// Errors at the byte-moving layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// The peer is unreachable or the connection dropped.
    ConnectionLost(String),
    /// The frame exceeds the configured maximum.
    FrameTooLarge { size: usize, max: usize },
    /// Generic I/O failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectionLost(msg) => write!(f, "connection lost: {}", msg),
            Error::FrameTooLarge { size, max } => {
                write!(f, "frame of {} bytes exceeds the {} byte limit", size, max)
            }
            Error::Io(msg) => write!(f, "i/o error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Sends and receives whole frames.
///
/// Object-safe so a client can hold `Arc<dyn Transport>`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one frame.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Receives the next frame. `Ok(None)` means the stream closed cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}
