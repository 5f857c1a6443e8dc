//! Strong and weak handles to a running session.
//!
//! A [`Context`] keeps the session alive; a [`WeakContext`] does not and has
//! to be [`load`](WeakContext::load)ed before use. Every operation on a
//! context is turned into a command for the session task, so it never runs
//! concurrently with the session's own I/O completions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::http::response::Response;
use crate::session::connection::{Command, Op};
use crate::session::error::SessionError;
use crate::session::timer::Deadline;
use crate::session::SessionId;

/// State shared between the session task and its contexts.
///
/// Dropping the last `Arc` closes the command channel, which is how an idle
/// session task learns that nobody can reach it anymore.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) id: SessionId,
    pub(crate) peer: Option<SocketAddr>,
    pub(crate) local: Option<SocketAddr>,
    closed: AtomicBool,
    commands: mpsc::UnboundedSender<Command>,
    done: watch::Receiver<bool>,
}

impl Shared {
    pub(crate) fn new(
        id: SessionId,
        peer: Option<SocketAddr>,
        local: Option<SocketAddr>,
        commands: mpsc::UnboundedSender<Command>,
        done: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            peer,
            local,
            closed: AtomicBool::new(false),
            commands,
            done,
        }
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Strong handle to a session.
///
/// Handlers receive one per request; it may be cloned, stored and used from
/// any task. As long as it exists, the session stays alive.
#[derive(Debug, Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

impl Context {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub(crate) fn submit(&self, op: Op) -> Result<(), SessionError> {
        if self.shared.is_closed() {
            return Err(SessionError::Closed);
        }
        self.enqueue(op)
    }

    fn enqueue(&self, op: Op) -> Result<(), SessionError> {
        self.shared
            .commands
            .send(Command::new(op, Arc::clone(&self.shared)))
            .map_err(|_| SessionError::Closed)
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Remote address of the underlying socket, if it has one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.peer
    }

    /// Local address of the underlying socket, if it has one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.local
    }

    /// `false` once `eof`/`cls` was requested or the session shut down on its own.
    pub fn is_open(&self) -> bool {
        !self.shared.is_closed()
    }

    /// Resolves once the session task has shut the socket and exited.
    pub async fn closed(&self) {
        let mut done = self.shared.done.clone();
        // A dropped sender means the task is gone as well.
        let _ = done.wait_for(|closed| *closed).await;
    }

    /// Downgrades to a handle that does not keep the session alive.
    pub fn weak(&self) -> WeakContext {
        WeakContext {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Reads the next request and dispatches it to the router.
    pub fn recv(&self) -> Result<(), SessionError> {
        self.submit(Op::Recv(None))
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<(), SessionError> {
        self.submit(Op::Recv(Some(Deadline::After(timeout))))
    }

    pub fn recv_until(&self, deadline: Instant) -> Result<(), SessionError> {
        self.submit(Op::Recv(Some(Deadline::At(deadline))))
    }

    /// Queues the answer to the current request.
    ///
    /// Once written, the session reads the next request, or closes if the
    /// response carries `Connection: close`.
    pub fn send(&self, response: Response) -> Result<(), SessionError> {
        self.submit(Op::Send(response, None))
    }

    pub fn send_timeout(&self, response: Response, timeout: Duration) -> Result<(), SessionError> {
        self.submit(Op::Send(response, Some(Deadline::After(timeout))))
    }

    pub fn send_until(&self, response: Response, deadline: Instant) -> Result<(), SessionError> {
        self.submit(Op::Send(response, Some(Deadline::At(deadline))))
    }

    /// Queues a server-initiated message without affecting the read cycle.
    pub fn push(&self, response: Response) -> Result<(), SessionError> {
        self.submit(Op::Push(response))
    }

    /// Parks the session without issuing I/O until another operation resumes it.
    pub fn wait(&self) -> Result<(), SessionError> {
        self.submit(Op::Wait(None))
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), SessionError> {
        self.submit(Op::Wait(Some(Deadline::After(timeout))))
    }

    pub fn wait_until(&self, deadline: Instant) -> Result<(), SessionError> {
        self.submit(Op::Wait(Some(Deadline::At(deadline))))
    }

    pub fn timer_cancel(&self) -> Result<(), SessionError> {
        self.submit(Op::TimerCancel)
    }

    /// Writes out what is already queued, shuts down the send direction and closes.
    pub fn eof(&self) {
        if self.submit(Op::Eof).is_ok() {
            self.shared.mark_closed();
        }
    }

    /// Closes the socket right away, dropping anything still queued.
    ///
    /// Also cuts short a pending `eof`. On a session that is already gone
    /// this does nothing.
    pub fn cls(&self) {
        self.shared.mark_closed();
        let _ = self.enqueue(Op::Close);
    }
}

/// Non-owning handle to a session.
#[derive(Debug, Clone)]
pub struct WeakContext {
    shared: Weak<Shared>,
}

impl WeakContext {
    /// `true` once the session has been destroyed.
    pub fn expired(&self) -> bool {
        self.shared.strong_count() == 0
    }

    /// Upgrades to a strong context, or `None` if the session is gone.
    pub fn load(&self) -> Option<Context> {
        self.shared.upgrade().map(Context::new)
    }
}
