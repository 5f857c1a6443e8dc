//! HTTP protocol value types and wire format.
//!
//! This module holds everything the session engine needs to turn bytes into
//! requests and responses into bytes. It does not drive any I/O itself; that
//! is the job of [`crate::session`].
//!
//! # Architecture
//!
//! - **`request`**: HTTP request representation and parsing utilities
//! - **`response`**: HTTP response representation with builder pattern
//! - **`parser`**: Parses incoming HTTP requests from byte buffers
//! - **`writer`**: Serializes HTTP responses into bytes
//! - **`codec`**: The [`codec::Codec`] seam the session decodes and encodes through
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use reactor::http::codec::{Codec, Http1Codec};
//!
//! let mut codec = Http1Codec;
//! let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n"[..]);
//! let request = codec.decode(&mut buf).unwrap().unwrap();
//! assert_eq!(request.path, "/");
//! ```

pub mod request;
pub mod response;
pub mod parser;
pub mod writer;
pub mod codec;
