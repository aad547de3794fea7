//! # Unix Domain Socket IPC
//!
//! The local transport of the bridge: a length-prefixed frame stream over a
//! Unix domain socket, driven by the platform reactor.
//!
//! ## Invariants
//! - **Single Slot**: the live channel lives in one guarded slot; `start`
//!   and `stop` replace it atomically and are both idempotent.
//! - **Full Teardown**: `stop` closes everything the controller owns: the
//!   accept loop, every live connection it spawned, and (client side) the
//!   stream itself.
//! - **Byte-Oriented**: the server loop hands whole frames to a
//!   `RequestHandler` and writes whole reply frames back. Frame content is
//!   opaque here.
//! - The controller never deletes the socket file; the host owns the file
//!   lifecycle.
//!
//! Wire framing is a u32 little-endian length prefix followed by that many
//! payload bytes.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixListener;
use tokio::net::UnixStream;
use tokio::net::unix::OwnedReadHalf;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;

use crate::transport;
use crate::transport::Transport;

/// Default cap on a single frame, payload bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Option-map key for the frame size cap.
pub const OPT_MAX_FRAME_BYTES: &str = "max_frame_bytes";

#[derive(Debug, Clone)]
pub enum Error {
    /// No event reactor is available on this platform.
    NoReactor(String),
    /// An option-map value could not be parsed.
    BadOption { key: String, value: String },
    /// Binding the server socket failed.
    Bind { path: PathBuf, message: String },
    /// Connecting to the server socket failed.
    Connect { path: PathBuf, message: String },
    /// The controller is not started, or not in the required mode.
    NotAvailable(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoReactor(os) => write!(f, "no event reactor available on '{}'", os),
            Error::BadOption { key, value } => {
                write!(f, "cannot parse option '{}' = '{}'", key, value)
            }
            Error::Bind { path, message } => {
                write!(f, "cannot bind {}: {}", path.display(), message)
            }
            Error::Connect { path, message } => {
                write!(f, "cannot connect to {}: {}", path.display(), message)
            }
            Error::NotAvailable(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// The platform event reactor behind the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reactor {
    Epoll,
    Kqueue,
}

impl Reactor {
    /// Chooses the reactor for the build target. Fatal on platforms with
    /// neither epoll nor kqueue.
    pub fn detect() -> Result<Self> {
        if cfg!(any(target_os = "linux", target_os = "android")) {
            Ok(Reactor::Epoll)
        } else if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd",
        )) {
            Ok(Reactor::Kqueue)
        } else {
            Err(Error::NoReactor(std::env::consts::OS.to_string()))
        }
    }
}

/// Serves one decoded request frame, producing the reply frame.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, payload: &[u8]) -> Vec<u8>;
}

/// Runs when a connection is established.
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mode {
    Server,
    Client,
}

/// Configures an [`IpcController`].
pub struct IpcBuilder {
    path: PathBuf,
    mode: Mode,
    handler: Option<Arc<dyn RequestHandler>>,
    options: HashMap<String, String>,
    on_connect: Option<ConnectCallback>,
}

impl IpcBuilder {
    /// A server endpoint: binds the path and serves requests through the
    /// handler.
    pub fn server(path: impl AsRef<Path>, handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode: Mode::Server,
            handler: Some(handler),
            options: HashMap::new(),
            on_connect: None,
        }
    }

    /// A client endpoint: connects to the path.
    pub fn client(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode: Mode::Client,
            handler: None,
            options: HashMap::new(),
            on_connect: None,
        }
    }

    /// Sets a string option. Unrecognized keys are ignored at build time.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Installs a connection-initialization callback.
    pub fn on_connect(mut self, callback: ConnectCallback) -> Self {
        self.on_connect = Some(callback);
        self
    }

    /// Resolves the reactor and options into a controller. Does not touch
    /// the socket; that happens in `start`.
    pub fn build(self) -> Result<IpcController> {
        let reactor = Reactor::detect()?;

        let max_frame_bytes = match self.options.get(OPT_MAX_FRAME_BYTES) {
            Some(raw) => raw.parse::<usize>().map_err(|_| Error::BadOption {
                key: OPT_MAX_FRAME_BYTES.to_string(),
                value: raw.clone(),
            })?,
            None => DEFAULT_MAX_FRAME_BYTES,
        };

        Ok(IpcController {
            path: self.path,
            mode: self.mode,
            reactor,
            max_frame_bytes,
            handler: self.handler,
            on_connect: self.on_connect,
            slot: Mutex::new(None),
            active: AtomicBool::new(false),
        })
    }
}

enum ChannelState {
    Server {
        accept_task: JoinHandle<()>,
        shutdown: watch::Sender<bool>,
        conns: Arc<Mutex<JoinSet<()>>>,
    },
    Client {
        transport: Arc<SocketTransport>,
    },
}

/// The live endpoint. Owns the single channel slot.
pub struct IpcController {
    path: PathBuf,
    mode: Mode,
    reactor: Reactor,
    max_frame_bytes: usize,
    handler: Option<Arc<dyn RequestHandler>>,
    on_connect: Option<ConnectCallback>,
    slot: Mutex<Option<ChannelState>>,
    active: AtomicBool,
}

impl IpcController {
    pub fn reactor(&self) -> Reactor {
        self.reactor
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Non-blocking: whether a channel is currently installed.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Binds (server) or connects (client) and installs the channel.
    /// Idempotent: a second `start` on an active controller is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let state = match self.mode {
            Mode::Server => self.start_server().await?,
            Mode::Client => self.start_client().await?,
        };

        *slot = Some(state);
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    /// Tears the channel down, live connections included. Idempotent.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(state) = slot.take() {
            match state {
                ChannelState::Server { accept_task, shutdown, conns } => {
                    let _ = shutdown.send(true);
                    let _ = accept_task.await;
                    // Connections that miss the signal are aborted; either
                    // way nothing owned by this controller survives.
                    conns.lock().await.shutdown().await;
                    tracing::info!(path = %self.path.display(), "ipc server stopped");
                }
                ChannelState::Client { transport } => {
                    transport.close().await;
                    tracing::info!(path = %self.path.display(), "ipc client disconnected");
                }
            }
        }
        self.active.store(false, Ordering::Release);
    }

    /// The client-side transport. Available while a client controller is
    /// active.
    pub async fn transport(&self) -> Result<Arc<dyn Transport>> {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(ChannelState::Client { transport }) => Ok(transport.clone()),
            Some(ChannelState::Server { .. }) => {
                Err(Error::NotAvailable("controller is in server mode".into()))
            }
            None => Err(Error::NotAvailable("controller is not started".into())),
        }
    }

    async fn start_server(&self) -> Result<ChannelState> {
        let listener = UnixListener::bind(&self.path).map_err(|e| Error::Bind {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        tracing::info!(path = %self.path.display(), reactor = ?self.reactor, "ipc server bound");

        let handler = self
            .handler
            .clone()
            .ok_or_else(|| Error::NotAvailable("server controller without handler".into()))?;
        let on_connect = self.on_connect.clone();
        let max = self.max_frame_bytes;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let conns: Arc<Mutex<JoinSet<()>>> = Arc::new(Mutex::new(JoinSet::new()));

        let accept_conns = conns.clone();
        let mut accept_shutdown = shutdown_rx.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = accept_shutdown.changed() => break,
                    result = listener.accept() => match result {
                        Ok((stream, _addr)) => {
                            tracing::debug!("ipc connection accepted");
                            if let Some(callback) = &on_connect {
                                callback();
                            }
                            let handler = handler.clone();
                            let shutdown = shutdown_rx.clone();
                            let mut set = accept_conns.lock().await;
                            set.spawn(serve_connection(stream, handler, max, shutdown));
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "ipc accept failed");
                        }
                    }
                }
            }
        });

        Ok(ChannelState::Server { accept_task, shutdown, conns })
    }

    async fn start_client(&self) -> Result<ChannelState> {
        let stream = UnixStream::connect(&self.path).await.map_err(|e| Error::Connect {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        tracing::info!(path = %self.path.display(), reactor = ?self.reactor, "ipc client connected");

        if let Some(callback) = &self.on_connect {
            callback();
        }

        let transport = Arc::new(SocketTransport::new(stream, self.max_frame_bytes));
        Ok(ChannelState::Client { transport })
    }
}

async fn serve_connection(
    stream: UnixStream,
    handler: Arc<dyn RequestHandler>,
    max: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let payload = tokio::select! {
            _ = shutdown.changed() => {
                tracing::debug!("ipc connection closing on stop");
                break;
            }
            frame = read_frame(&mut reader, max) => match frame {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    tracing::debug!("ipc connection closed by peer");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ipc read failed");
                    break;
                }
            },
        };

        let reply = handler.handle(&payload).await;

        if let Err(e) = write_frame(&mut writer, &reply, max).await {
            tracing::warn!(error = %e, "ipc write failed");
            break;
        }
    }
}

/// Reads one length-prefixed frame. `Ok(None)` on clean end of stream.
pub async fn read_frame<R>(reader: &mut R, max: usize) -> transport::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(transport::Error::Io(e.to_string())),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > max {
        return Err(transport::Error::FrameTooLarge { size: len, max });
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| transport::Error::ConnectionLost(e.to_string()))?;

    Ok(Some(payload))
}

/// Writes one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max: usize) -> transport::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max {
        return Err(transport::Error::FrameTooLarge { size: payload.len(), max });
    }

    let len = (payload.len() as u32).to_le_bytes();
    writer
        .write_all(&len)
        .await
        .map_err(|e| transport::Error::ConnectionLost(e.to_string()))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| transport::Error::ConnectionLost(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| transport::Error::Io(e.to_string()))?;

    Ok(())
}

/// A connected client socket behind the [`Transport`] seam.
pub struct SocketTransport {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    max_frame_bytes: usize,
    closed: AtomicBool,
}

impl SocketTransport {
    fn new(stream: UnixStream, max_frame_bytes: usize) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            max_frame_bytes,
            closed: AtomicBool::new(false),
        }
    }

    /// Shuts the stream down. Later sends fail, the peer sees end of
    /// stream, and the reply pump drains out on the resulting EOF. The
    /// controller calls this before clearing its slot; clones held by a
    /// client see the same closed state.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

#[async_trait::async_trait]
impl Transport for SocketTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(transport::Error::ConnectionLost("transport closed".into()));
        }
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, payload, self.max_frame_bytes).await
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut reader = self.reader.lock().await;
        read_frame(&mut *reader, self.max_frame_bytes).await
    }
}
