//! Per-connection HTTP sessions.
//!
//! A [`Session`] takes ownership of one connected socket and drives it
//! through receive, dispatch and respond cycles on its own tokio task. User
//! code steers it through [`Context`] handles:
//!
//! - **`connection`**: the state machine task that owns socket, buffer, timer and queue
//! - **`context`**: strong/weak handles that forward operations to the task
//! - **`queue`**: in-order, single-writer response queue
//! - **`timer`**: the session's cancellable deadline
//! - **`transport`**: what a session can run on top of
//!
//! # Example
//!
//! ```no_run
//! use reactor::http::response::Response;
//! use reactor::router::Router;
//! use reactor::session::Session;
//! use tokio::net::TcpListener;
//!
//! # async fn serve() -> anyhow::Result<()> {
//! let router = Router::new();
//! router.get(r"^/$", |request, context| {
//!     let _ = context.send(Response::ok("hello\n").with_keep_alive(request.keep_alive()));
//! }).await?;
//!
//! let listener = TcpListener::bind("127.0.0.1:8080").await?;
//! loop {
//!     let (socket, _peer) = listener.accept().await?;
//!     Session::new(socket, router.clone()).recv();
//! }
//! # }
//! ```

mod connection;
pub mod context;
pub mod error;
mod queue;
pub mod timer;
pub mod transport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{info_span, warn, Instrument};

use crate::http::codec::{Codec, Http1Codec};
use crate::http::response::Response;
use crate::router::Router;

use connection::{Connection, Op};
use context::Shared;

pub use context::{Context, WeakContext};
pub use error::SessionError;
pub use timer::Deadline;
pub use transport::Transport;

static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a session, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Tunables applied to every session built with it.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bytes reserved in the input buffer at a time.
    pub buffer_capacity: usize,
    /// Largest request the buffer may hold before it is rejected as malformed.
    pub max_request_size: usize,
    /// Deadline for the `recv` issued automatically after a keep-alive response.
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 4096,
            max_request_size: 64 * 1024,
            idle_timeout: None,
        }
    }
}

pub type OnError = Arc<dyn Fn(&SessionError, &'static str) + Send + Sync>;
pub type OnTimer = Arc<dyn Fn(Context) + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Callbacks {
    pub(crate) on_error: OnError,
    pub(crate) on_timer: OnTimer,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            on_error: Arc::new(|err: &SessionError, source: &'static str| {
                warn!(source, error = %err, "session error");
            }),
            on_timer: Arc::new(|context: Context| {
                tracing::debug!(session = %context.id(), "timed out, closing");
                context.cls();
            }),
        }
    }
}

/// Builder that seeds a session with a connected socket.
///
/// Nothing runs until one of the launching methods (`recv`, `send`, `wait`,
/// `eof`, `cls` and their timed variants) is called; each spawns the session
/// task and applies that first operation.
pub struct Session<S, C = Http1Codec> {
    stream: S,
    codec: C,
    router: Router,
    callbacks: Callbacks,
    config: SessionConfig,
}

impl<S: Transport> Session<S> {
    pub fn new(stream: S, router: Router) -> Self {
        Self {
            stream,
            codec: Http1Codec,
            router,
            callbacks: Callbacks::default(),
            config: SessionConfig::default(),
        }
    }
}

impl<S: Transport, C: Codec> Session<S, C> {
    /// Replaces the wire codec.
    pub fn with_codec<D: Codec>(self, codec: D) -> Session<S, D> {
        Session {
            stream: self.stream,
            codec,
            router: self.router,
            callbacks: self.callbacks,
            config: self.config,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Called once per transport or parse failure, and for rejected operations.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&SessionError, &'static str) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Arc::new(on_error);
        self
    }

    /// Called when an armed deadline passes. The default closes the session.
    pub fn on_timer<F>(mut self, on_timer: F) -> Self
    where
        F: Fn(Context) + Send + Sync + 'static,
    {
        self.callbacks.on_timer = Arc::new(on_timer);
        self
    }

    pub fn recv(self) -> Context {
        self.launch(Op::Recv(None))
    }

    pub fn recv_timeout(self, timeout: Duration) -> Context {
        self.launch(Op::Recv(Some(Deadline::After(timeout))))
    }

    pub fn recv_until(self, deadline: Instant) -> Context {
        self.launch(Op::Recv(Some(Deadline::At(deadline))))
    }

    pub fn send(self, response: Response) -> Context {
        self.launch(Op::Send(response, None))
    }

    pub fn send_timeout(self, response: Response, timeout: Duration) -> Context {
        self.launch(Op::Send(response, Some(Deadline::After(timeout))))
    }

    pub fn send_until(self, response: Response, deadline: Instant) -> Context {
        self.launch(Op::Send(response, Some(Deadline::At(deadline))))
    }

    pub fn wait(self) -> Context {
        self.launch(Op::Wait(None))
    }

    pub fn wait_timeout(self, timeout: Duration) -> Context {
        self.launch(Op::Wait(Some(Deadline::After(timeout))))
    }

    pub fn wait_until(self, deadline: Instant) -> Context {
        self.launch(Op::Wait(Some(Deadline::At(deadline))))
    }

    /// Shuts down the send direction of the socket and closes it.
    pub fn eof(self) {
        self.launch(Op::Eof);
    }

    /// Closes the socket.
    pub fn cls(self) {
        self.launch(Op::Close);
    }

    fn launch(self, first: Op) -> Context {
        let id = SessionId::next();
        let peer = self.stream.peer_addr();
        let local = self.stream.local_addr();

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = watch::channel(false);
        let shared = Arc::new(Shared::new(id, peer, local, commands_tx, done_rx));
        let context = Context::new(Arc::clone(&shared));

        // The receiver is alive, so the first command cannot be rejected.
        let _ = context.submit(first);

        let connection = Connection::new(
            self.stream,
            self.codec,
            self.router,
            self.callbacks,
            self.config,
            Arc::downgrade(&shared),
            commands_rx,
            done_tx,
        );
        let span = info_span!("session", id = %id, peer = ?peer);
        tokio::spawn(connection.run().instrument(span));

        context
    }
}
