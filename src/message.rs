//! Values that move through the pipeline.
//!
//! - `Datagram`: what a reader hands back after one receive
//! - `Request`: a datagram stamped with its receipt time, owned by one worker
//! - `Response`: bytes a processor wants written back to some address

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::SocketAddr;

/// One received datagram, as produced by a reader.
#[derive(Debug)]
pub struct Datagram {
    /// Sender of the datagram.
    pub remote_addr: SocketAddr,
    /// Receive buffer.
    pub data: BytesMut,
    /// Number of bytes actually received into `data`.
    pub length: usize,
}

/// A datagram accepted into the pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    remote_addr: SocketAddr,
    data: Bytes,
    read_at: DateTime<Utc>,
}

impl Request {
    /// Build a request from a receive buffer.
    ///
    /// `length` is the number of bytes the reader claims to have received.
    /// It must not exceed the buffer; a zero length is an empty datagram.
    pub fn new(
        remote_addr: SocketAddr,
        data: BytesMut,
        length: usize,
        read_at: DateTime<Utc>,
    ) -> Result<Self, RequestError> {
        if length > data.len() {
            return Err(RequestError::LengthExceedsBuffer {
                length,
                capacity: data.len(),
            });
        }

        let mut data = data.freeze();
        data.truncate(length);

        Ok(Self {
            remote_addr,
            data,
            read_at,
        })
    }

    /// Convert a reader's datagram into a request received at `read_at`.
    pub fn from_datagram(datagram: Datagram, read_at: DateTime<Utc>) -> Result<Self, RequestError> {
        Self::new(datagram.remote_addr, datagram.data, datagram.length, read_at)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Received payload, exactly `len()` bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Number of bytes received.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read_at(&self) -> DateTime<Utc> {
        self.read_at
    }
}

/// Request construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    LengthExceedsBuffer { length: usize, capacity: usize },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::LengthExceedsBuffer { length, capacity } => write!(
                f,
                "received length {length} exceeds buffer capacity {capacity}"
            ),
        }
    }
}

impl std::error::Error for RequestError {}

/// Bytes to write to a remote address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    remote_addr: SocketAddr,
    data: Bytes,
    length: usize,
}

impl Response {
    /// Response carrying the whole of `data`.
    pub fn new(remote_addr: SocketAddr, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let length = data.len();
        Self {
            remote_addr,
            data,
            length,
        }
    }

    /// Response writing only the first `length` bytes of `data`.
    pub fn with_length(
        remote_addr: SocketAddr,
        data: impl Into<Bytes>,
        length: usize,
    ) -> Result<Self, ResponseError> {
        let data = data.into();
        if length > data.len() {
            return Err(ResponseError::LengthExceedsPayload {
                length,
                payload: data.len(),
            });
        }
        Ok(Self {
            remote_addr,
            data,
            length,
        })
    }

    /// Reply to the sender of `request`.
    pub fn reply(request: &Request, data: impl Into<Bytes>) -> Self {
        Self::new(request.remote_addr(), data)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Bytes to put on the wire, exactly `len()` of them.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.length]
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Response construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    LengthExceedsPayload { length: usize, payload: usize },
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseError::LengthExceedsPayload { length, payload } => write!(
                f,
                "response length {length} exceeds payload of {payload} bytes"
            ),
        }
    }
}

impl std::error::Error for ResponseError {}
