//! Header protocol parser.

use bytes::Buf;
use std::fmt;

/// Every datagram of this protocol is exactly this long.
pub const DATAGRAM_LEN: usize = 20;

/// Bytes taken by the header at the front of the datagram.
pub const HEADER_LEN: usize = 8;

/// Decoded datagram header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub transaction_id: u8,
    pub op_code: u8,
    pub status_code: u8,
    /// Big-endian on the wire.
    pub stream_handle: u32,
}

/// Parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Datagram is not `DATAGRAM_LEN` bytes.
    InvalidLength(usize),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidLength(len) => write!(f, "Invalid package length of {len}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse the header of a full datagram.
pub fn parse(mut input: &[u8]) -> Result<Header, ParseError> {
    if input.len() != DATAGRAM_LEN {
        return Err(ParseError::InvalidLength(input.len()));
    }

    Ok(Header {
        version: input.get_u8(),
        transaction_id: input.get_u8(),
        op_code: input.get_u8(),
        status_code: input.get_u8(),
        stream_handle: input.get_u32(),
    })
}

/// Acknowledgement sent for every valid datagram.
pub fn response_ack() -> &'static [u8] {
    b"GOT IT"
}
