//! Request decoding and response encoding for a session.
//!
//! The session engine never looks at wire bytes itself: it hands its input
//! buffer to a [`Codec`] and queues whatever the codec encodes. Swapping the
//! codec swaps the wire format without touching the state machine.

use bytes::{Buf, BytesMut};

use crate::http::parser::{parse_http_request, ParseError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::serialize_response;

pub trait Codec: Send + 'static {
    /// Decodes one request from the front of `buf`, consuming its bytes.
    ///
    /// Returns `Ok(None)` when more input is needed. Bytes belonging to a
    /// following (pipelined) request must be left in the buffer.
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Request>, ParseError>;

    /// Serializes a response into the bytes to put on the wire.
    fn encode(&mut self, response: &Response) -> Vec<u8>;
}

/// HTTP/1.1 text codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct Http1Codec;

impl Codec for Http1Codec {
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Request>, ParseError> {
        match parse_http_request(&buf[..]) {
            Ok((request, consumed)) => {
                buf.advance(consumed);
                Ok(Some(request))
            }
            Err(ParseError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn encode(&mut self, response: &Response) -> Vec<u8> {
        serialize_response(response)
    }
}
