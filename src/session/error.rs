use thiserror::Error;

use crate::http::parser::ParseError;

/// Failures a session reports through its `on_error` callback, or returns
/// from a [`Context`](crate::session::Context) operation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport failed (reset, broken pipe, ...).
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The codec rejected the request bytes.
    #[error("malformed request: {0}")]
    Parse(#[from] ParseError),

    /// An operation was issued while another of the same kind is outstanding.
    #[error("`{0}` issued while a previous `{0}` is still outstanding")]
    StateViolation(&'static str),

    /// The session is closing or already closed.
    #[error("session is closed")]
    Closed,
}
