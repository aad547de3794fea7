//! In-memory transport for tests.
//!
//! Built on `tokio::io::duplex`, so the same length-prefixed framing that
//! runs on the socket runs here too. Frames written on one end come out of
//! the other end's `recv`, which is enough to exercise the client pump
//! without a filesystem.

use tokio::io::DuplexStream;
use tokio::io::ReadHalf;
use tokio::io::WriteHalf;
use tokio::sync::Mutex;

use crate::ipc::DEFAULT_MAX_FRAME_BYTES;
use crate::ipc::read_frame;
use crate::ipc::write_frame;
use crate::transport;
use crate::transport::Transport;

const PIPE_CAPACITY: usize = 64 * 1024;

/// One end of an in-memory framed byte pipe.
pub struct PipeTransport {
    reader: Mutex<ReadHalf<DuplexStream>>,
    writer: Mutex<WriteHalf<DuplexStream>>,
    max_frame_bytes: usize,
}

impl PipeTransport {
    /// Creates two connected ends. Dropping one end surfaces as end of
    /// stream on the other, like a closed socket.
    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(PIPE_CAPACITY);
        (Self::from_stream(a), Self::from_stream(b))
    }

    fn from_stream(stream: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[async_trait::async_trait]
impl Transport for PipeTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, payload, self.max_frame_bytes).await
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut reader = self.reader.lock().await;
        read_frame(&mut *reader, self.max_frame_bytes).await
    }
}
