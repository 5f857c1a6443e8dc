//! Shared helpers for driving sessions from the client side.

use reactor::SessionError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A response as seen on the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    #[allow(dead_code)]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Client end of a connection, reading responses one at a time.
pub struct Client<S> {
    stream: S,
    buf: Vec<u8>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, buf: Vec::new() }
    }

    pub async fn write(&mut self, raw: &[u8]) {
        self.stream.write_all(raw).await.unwrap();
    }

    #[allow(dead_code)]
    pub async fn shutdown(&mut self) {
        self.stream.shutdown().await.unwrap();
    }

    /// Next complete response, or `None` once the server has closed.
    pub async fn response(&mut self) -> Option<RawResponse> {
        loop {
            if let Some(response) = self.take_response() {
                return Some(response);
            }

            let mut chunk = [0u8; 1024];
            let n = self.stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return None;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn take_response(&mut self) -> Option<RawResponse> {
        let end = self.buf.windows(4).position(|w| w == b"\r\n\r\n")?;
        let head = String::from_utf8(self.buf[..end].to_vec()).unwrap();
        let mut lines = head.split("\r\n");

        let status = lines
            .next()
            .and_then(|line| line.split(' ').nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        let length: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
            .map(|(_, v)| v.parse().unwrap())
            .unwrap_or(0);

        let total = end + 4 + length;
        if self.buf.len() < total {
            return None;
        }
        let body = String::from_utf8(self.buf[end + 4..total].to_vec()).unwrap();
        self.buf.drain(..total);

        Some(RawResponse { status, headers, body })
    }
}

/// Short label for asserting on reported errors.
#[allow(dead_code)]
pub fn error_label(err: &SessionError) -> &'static str {
    match err {
        SessionError::Io(_) => "io",
        SessionError::Parse(_) => "parse",
        SessionError::StateViolation(_) => "state",
        SessionError::Closed => "closed",
    }
}
