//! The per-connection state machine.
//!
//! One [`Connection`] runs as one tokio task and is the only code that ever
//! touches the socket, the input buffer, the timer or the response queue.
//! Contexts talk to it through a command channel, so even on a multi-threaded
//! runtime a session's reads, writes, timer expiries and handler calls are
//! strictly serialized.
//!
//! ```text
//!            recv                 full request
//!   Idle ─────────────▶ Reading ───────────────▶ handler(request, context)
//!    ▲                     │ EOF / error                 │ send / push
//!    │                     ▼                             ▼
//!    │                 Closing ◀──── Connection: close ─ Writing
//!    └──────────────── keep-alive ───────────────────────┘
//! ```
//!
//! While anything is outstanding (a read, a queued write, an armed timer or
//! a `wait`) the task holds a strong reference to the session. Once it goes
//! idle it lets go; if no context holds one either, the command channel
//! closes and the task exits, closing the socket.

use std::io;
use std::sync::{Arc, Weak};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, trace};

use crate::http::codec::Codec;
use crate::http::parser::ParseError;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::router::Router;
use crate::session::context::{Context, Shared};
use crate::session::error::SessionError;
use crate::session::queue::{Delivery, Outgoing, ResponseQueue};
use crate::session::timer::{Deadline, Guard, Timer};
use crate::session::{Callbacks, SessionConfig, Transport};

/// An operation requested through a context.
#[derive(Debug)]
pub(crate) enum Op {
    Recv(Option<Deadline>),
    Send(Response, Option<Deadline>),
    Push(Response),
    Wait(Option<Deadline>),
    TimerCancel,
    Eof,
    Close,
}

/// An operation plus the strong reference that keeps the session alive
/// until the task has picked it up.
pub(crate) struct Command {
    op: Op,
    hold: Arc<Shared>,
}

impl Command {
    pub(crate) fn new(op: Op, hold: Arc<Shared>) -> Self {
        Self { op, hold }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Open,
    /// Flushing the queue before shutting down the send direction.
    Draining,
    Closed,
}

enum Event {
    Command(Option<Command>),
    Read(io::Result<usize>),
    Write(io::Result<usize>),
    Timer(Guard),
}

pub(crate) struct Connection<S, C> {
    reader: ReadHalf<S>,
    writer: WriteHalf<S>,
    codec: C,
    buffer: BytesMut,
    router: Router,
    callbacks: Callbacks,
    config: SessionConfig,
    timer: Timer,
    queue: ResponseQueue,
    reading: bool,
    waiting: bool,
    lifecycle: Lifecycle,
    shared: Weak<Shared>,
    hold: Option<Arc<Shared>>,
    commands: mpsc::UnboundedReceiver<Command>,
    done: watch::Sender<bool>,
}

impl<S: Transport, C: Codec> Connection<S, C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        stream: S,
        codec: C,
        router: Router,
        callbacks: Callbacks,
        config: SessionConfig,
        shared: Weak<Shared>,
        commands: mpsc::UnboundedReceiver<Command>,
        done: watch::Sender<bool>,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader,
            writer,
            codec,
            buffer: BytesMut::with_capacity(config.buffer_capacity),
            router,
            callbacks,
            config,
            timer: Timer::new(),
            queue: ResponseQueue::new(),
            reading: false,
            waiting: false,
            lifecycle: Lifecycle::Open,
            shared,
            hold: None,
            commands,
            done,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("session started");

        loop {
            match self.lifecycle {
                Lifecycle::Closed => break,
                Lifecycle::Draining if self.queue.is_empty() => {
                    self.shutdown().await;
                    break;
                }
                _ => {}
            }

            if self.reading && self.buffer.capacity() == self.buffer.len() {
                self.buffer.reserve(self.config.buffer_capacity);
            }
            let reading = self.reading;
            let writing = !self.queue.is_empty();

            let event = tokio::select! {
                command = self.commands.recv() => Event::Command(command),
                read = self.reader.read_buf(&mut self.buffer), if reading => Event::Read(read),
                written = self.writer.write(self.queue.pending()), if writing => Event::Write(written),
                guard = self.timer.expired() => Event::Timer(guard),
            };

            match event {
                Event::Command(Some(command)) => {
                    self.hold = Some(command.hold);
                    self.apply(command.op).await;
                }
                Event::Command(None) => {
                    debug!("no handles left, releasing idle session");
                    break;
                }
                Event::Read(result) => self.on_read(result).await,
                Event::Write(result) => self.on_write(result).await,
                Event::Timer(guard) => self.on_timer(guard),
            }

            if !self.is_busy() {
                self.hold = None;
            }
        }

        self.release();
    }

    fn is_busy(&self) -> bool {
        self.reading
            || self.waiting
            || self.timer.is_armed()
            || !self.queue.is_empty()
            || self.lifecycle == Lifecycle::Draining
    }

    async fn apply(&mut self, op: Op) {
        trace!(?op, "applying");
        match op {
            Op::Recv(deadline) => self.recv(deadline).await,
            Op::Send(response, deadline) => self.enqueue(response, Delivery::Reply, deadline),
            Op::Push(response) => self.enqueue(response, Delivery::Push, None),
            Op::Wait(deadline) => self.wait(deadline),
            Op::TimerCancel => self.timer.cancel(),
            Op::Eof => self.begin_eof(),
            Op::Close => self.close(),
        }
    }

    async fn recv(&mut self, deadline: Option<Deadline>) {
        if self.lifecycle != Lifecycle::Open {
            return self.report(&SessionError::Closed, "recv");
        }
        if self.reading {
            error!("recv issued while a read is outstanding");
            return self.report(&SessionError::StateViolation("recv"), "recv");
        }

        self.waiting = false;
        if let Some(deadline) = deadline {
            self.timer.arm(deadline, Guard::Read);
        }
        self.reading = true;
        self.try_dispatch().await;
    }

    fn enqueue(&mut self, response: Response, delivery: Delivery, deadline: Option<Deadline>) {
        if self.lifecycle != Lifecycle::Open {
            let op = if delivery == Delivery::Reply { "send" } else { "push" };
            return self.report(&SessionError::Closed, op);
        }

        let close = delivery == Delivery::Reply && !response.keep_alive();
        let bytes = self.codec.encode(&response);
        trace!(
            status = response.status.as_u16(),
            ?delivery,
            bytes = bytes.len(),
            queued = self.queue.len(),
            "queueing response"
        );

        let id = self.queue.enqueue(Outgoing::new(bytes, delivery, close));
        if delivery == Delivery::Reply {
            self.waiting = false;
        }
        // The deadline covers the wait behind earlier entries as well.
        if let Some(deadline) = deadline {
            self.timer.arm(deadline, Guard::Write(id));
        }
        if self.queue.head_id() == Some(id) {
            trace!(id, "writer started");
        }
    }

    fn wait(&mut self, deadline: Option<Deadline>) {
        if self.lifecycle != Lifecycle::Open {
            return self.report(&SessionError::Closed, "wait");
        }
        self.waiting = true;
        if let Some(deadline) = deadline {
            self.timer.arm(deadline, Guard::Wait);
        }
    }

    /// Decodes a request already sitting in the buffer, if there is one.
    async fn try_dispatch(&mut self) {
        match self.codec.decode(&mut self.buffer) {
            Ok(Some(request)) => {
                self.reading = false;
                self.timer.cancel_if(Guard::Read);
                self.dispatch(request).await;
            }
            Ok(None) if self.buffer.len() > self.config.max_request_size => {
                self.fail(ParseError::TooLarge.into(), "read");
            }
            Ok(None) => {}
            Err(e) => self.fail(e.into(), "read"),
        }
    }

    async fn dispatch(&mut self, request: Request) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        debug!(method = %request.method, path = %request.path, "dispatching request");

        let handler = self.router.resolve(&request.method, &request.path).await;
        handler(request, Context::new(shared));
    }

    async fn on_read(&mut self, result: io::Result<usize>) {
        match result {
            Ok(0) => {
                debug!(buffered = self.buffer.len(), "peer closed its side");
                self.reading = false;
                self.timer.cancel_if(Guard::Read);
                self.begin_eof();
            }
            Ok(n) => {
                trace!(bytes = n, "read");
                self.try_dispatch().await;
            }
            Err(e) => self.fail(e.into(), "read"),
        }
    }

    async fn on_write(&mut self, result: io::Result<usize>) {
        let n = match result {
            Ok(0) => return self.fail(io::Error::from(io::ErrorKind::WriteZero).into(), "write"),
            Ok(n) => n,
            Err(e) => return self.fail(e.into(), "write"),
        };

        let Some(entry) = self.queue.advance(n) else {
            return;
        };
        self.timer.cancel_if(Guard::Write(entry.id));
        trace!(id = entry.id, bytes = entry.len(), delivery = ?entry.delivery, "response written");

        if self.lifecycle != Lifecycle::Open || entry.delivery == Delivery::Push {
            return;
        }
        if entry.close {
            return self.begin_eof();
        }
        if !self.reading && !self.waiting {
            if let Some(idle) = self.config.idle_timeout {
                self.timer.arm(Deadline::After(idle), Guard::Read);
            }
            self.reading = true;
            self.try_dispatch().await;
        }
    }

    fn on_timer(&mut self, guard: Guard) {
        debug!(?guard, "timer expired");
        match guard {
            Guard::Read => self.reading = false,
            Guard::Wait => self.waiting = false,
            // The write keeps going. Unless on_timer calls cls, a partly
            // written response is still completed.
            Guard::Write(_) => {}
        }

        if let Some(shared) = self.shared.upgrade() {
            (self.callbacks.on_timer)(Context::new(shared));
        }
    }

    fn begin_eof(&mut self) {
        if self.lifecycle != Lifecycle::Open {
            return;
        }
        debug!(queued = self.queue.len(), "draining before shutdown");
        self.mark_closed();
        self.reading = false;
        self.waiting = false;
        self.lifecycle = Lifecycle::Draining;
    }

    fn close(&mut self) {
        self.mark_closed();
        self.lifecycle = Lifecycle::Closed;
    }

    fn fail(&mut self, err: SessionError, source: &'static str) {
        self.report(&err, source);
        self.close();
    }

    fn report(&self, err: &SessionError, source: &'static str) {
        (self.callbacks.on_error)(err, source);
    }

    fn mark_closed(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.mark_closed();
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            if e.kind() != io::ErrorKind::NotConnected {
                self.report(&SessionError::Io(e), "shutdown");
            }
        }
    }

    fn release(mut self) {
        self.mark_closed();
        self.timer.cancel();
        let abandoned = self.queue.clear();
        if abandoned > 0 {
            debug!(abandoned, "dropping unsent responses");
        }

        // Nothing may keep the session alive past this point.
        self.hold = None;
        self.commands.close();
        while self.commands.try_recv().is_ok() {}

        let Connection { reader, writer, done, .. } = self;
        drop(reader);
        drop(writer);
        done.send_replace(true);
        debug!("session closed");
    }
}
