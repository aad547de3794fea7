//! # Bridge Client
//!
//! The calling half of the bridge: encodes calls, pumps replies off the
//! transport, and correlates them with waiting callers by sequence number.
//!
//! The client spawns one background pump task per transport. Each client
//! owns its transport exclusively, so sequence numbers are scoped to a
//! single connection; wrap the client in `Arc` to share it across tasks.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;

use helmpack::Decoder;
use helmpack::Encoder;
use helmrpc::CallEncoder;
use helmrpc::Frame;
use helmrpc::FrameError;
use helmrpc::ReplyOutcome;
use helmrpc::WireValue;

use crate::transport;
use crate::transport::Transport;

/// Default time a caller waits for its reply.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub enum Error {
    Transport(transport::Error),
    Frame(FrameError),
    /// No reply arrived within the call timeout.
    Timeout,
    /// The pump dropped the pending call, usually because the connection
    /// went away.
    ChannelClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Frame(e) => write!(f, "frame error: {}", e),
            Error::Timeout => write!(f, "call timed out"),
            Error::ChannelClosed => write!(f, "reply channel closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

type PendingReply = oneshot::Sender<Result<ReplyOutcome>>;

/// A calling endpoint with an async reply pump.
pub struct BridgeClient {
    /// Opaque caller-identity token injected into every call.
    caller: Option<String>,
    transport: Arc<dyn Transport>,
    pending: Arc<DashMap<u64, PendingReply>>,
    seq_gen: AtomicU64,
    timeout: Duration,
}

impl BridgeClient {
    /// Creates a client over the transport and spawns the pump task.
    pub fn new(transport: Arc<dyn Transport>, caller: Option<String>) -> Self {
        let pending: Arc<DashMap<u64, PendingReply>> = Arc::new(DashMap::new());

        let pump_transport = transport.clone();
        let pump_pending = pending.clone();

        tokio::spawn(async move {
            let error = loop {
                match pump_transport.recv().await {
                    Ok(Some(payload)) => {
                        if let Err(e) = route_reply(&payload, &pump_pending) {
                            tracing::warn!(error = %e, "reply pump stopping");
                            break e;
                        }
                    }
                    Ok(None) => {
                        break Error::Transport(transport::Error::ConnectionLost(
                            "stream closed".into(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "transport error in reply pump");
                        break Error::Transport(e);
                    }
                }
            };

            notify_all_pending(&pump_pending, error);
        });

        Self {
            caller,
            transport,
            pending,
            seq_gen: AtomicU64::new(1),
            timeout: CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Calls a registered method and waits for its reply.
    pub async fn call(
        &self,
        object: &str,
        method: &str,
        args: &[WireValue],
    ) -> Result<ReplyOutcome> {
        let seq = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, tx);

        let payload = match self.encode_call(seq, object, method, args) {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.remove(&seq);
                return Err(e);
            }
        };

        if let Err(e) = self.transport.send(&payload).await {
            self.pending.remove(&seq);
            return Err(e.into());
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending.remove(&seq);
                Err(Error::ChannelClosed)
            }
            Err(_) => {
                self.pending.remove(&seq);
                Err(Error::Timeout)
            }
        }
    }

    fn encode_call(
        &self,
        seq: u64,
        object: &str,
        method: &str,
        args: &[WireValue],
    ) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        CallEncoder::new(seq, object, method, self.caller.as_deref(), args).encode(&mut enc)?;
        enc.into_bytes().map_err(|e| Error::Frame(e.into()))
    }
}

/// Correlates one incoming frame with its pending caller.
fn route_reply(payload: &[u8], pending: &DashMap<u64, PendingReply>) -> Result<()> {
    let mut dec = Decoder::new(payload);
    let frame = Frame::decode(&mut dec)?;

    let Frame::Reply(reply) = frame else {
        return Err(Error::Frame(FrameError::ProtocolViolation(
            "pump received a call frame instead of a reply".into(),
        )));
    };

    // A missing entry is a duplicate or very late reply; drop it.
    if let Some((_, tx)) = pending.remove(&reply.seq) {
        let _ = tx.send(Ok(reply.outcome));
    }

    Ok(())
}

/// Fails every pending call with the given error.
fn notify_all_pending(pending: &DashMap<u64, PendingReply>, error: Error) {
    let keys: Vec<u64> = pending.iter().map(|e| *e.key()).collect();
    for key in keys {
        if let Some((_, tx)) = pending.remove(&key) {
            let _ = tx.send(Err(error.clone()));
        }
    }
}
