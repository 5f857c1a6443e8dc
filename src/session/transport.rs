use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// A connected duplex byte stream a session can own.
///
/// The address accessors are sampled once when the session starts and are
/// exposed on [`Context`](crate::session::Context).
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl Transport for TcpStream {
    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        TcpStream::local_addr(self).ok()
    }
}

#[cfg(unix)]
impl Transport for tokio::net::UnixStream {}

/// In-memory pipe, mostly useful for driving a session from tests.
impl Transport for DuplexStream {}
