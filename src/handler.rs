//! Handler roles an application implements to run on the server.
//!
//! - `Binder`: turns the listener into a reader handle and a writer handle,
//!   once, at startup
//! - `RequestHandler`: reads one datagram at a time on the reader thread,
//!   then processes each request on a worker
//! - `ResponseHandler`: writes a response on the shared writer handle
//!
//! Handle types are associated types of the binder, so readers and writers
//! receive the concrete transport type they were bound with.

use std::io;
use tracing::debug;

use crate::message::{Datagram, Request, Response};
use crate::runtime::socket::{DatagramReader, DatagramWriter, Listener, ReadError};
use crate::trace::TraceId;

/// Produces the read and write handles over a listener.
pub trait Binder: Send + 'static {
    type Reader: Send + 'static;
    type Writer: Send + Sync + 'static;

    /// Called exactly once before any read or write. Must not block; an
    /// error aborts startup.
    fn bind(
        &self,
        trace_id: &TraceId,
        listener: &Listener,
    ) -> io::Result<(Self::Reader, Self::Writer)>;
}

/// Reads and processes requests.
pub trait RequestHandler<R>: Send + Sync + 'static {
    /// Block until the next datagram arrives. `ReadError::Closed` stops the
    /// server; any other error is logged and reading continues.
    fn read(&self, trace_id: &TraceId, reader: &mut R) -> Result<Datagram, ReadError>;

    /// Interpret one request on a worker thread. Responses go out through
    /// `dispatcher`, any number of times.
    fn process(&self, trace_id: &TraceId, request: Request, dispatcher: &dyn Dispatch);
}

/// Writes responses.
pub trait ResponseHandler<W>: Send + Sync + 'static {
    /// Perform one write of `response.payload()` to `response.remote_addr()`.
    fn write(&self, trace_id: &TraceId, response: &Response, writer: &W) -> io::Result<usize>;
}

/// Called once a write attempt finished, successful or not.
pub type Completion<'a> = Box<dyn FnOnce(&Response, &io::Result<usize>) + 'a>;

/// Sends responses from inside `RequestHandler::process`.
pub trait Dispatch {
    /// Write `response`, then run `complete` with the outcome.
    fn dispatch_with(
        &self,
        trace_id: &TraceId,
        response: Response,
        complete: Option<Completion<'_>>,
    );

    fn dispatch(&self, trace_id: &TraceId, response: Response) {
        self.dispatch_with(trace_id, response, None);
    }
}

/// Binds a UDP listener to its datagram reader and writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpBinder;

impl Binder for UdpBinder {
    type Reader = DatagramReader;
    type Writer = DatagramWriter;

    fn bind(
        &self,
        trace_id: &TraceId,
        listener: &Listener,
    ) -> io::Result<(DatagramReader, DatagramWriter)> {
        let reader = listener.reader()?;
        let writer = listener.writer()?;
        debug!(trace_id = %trace_id, addr = ?listener.local_addr().ok(), "Bound reader and writer");
        Ok((reader, writer))
    }
}

/// Writes a response as a single datagram.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpWriter;

impl ResponseHandler<DatagramWriter> for UdpWriter {
    fn write(
        &self,
        trace_id: &TraceId,
        response: &Response,
        writer: &DatagramWriter,
    ) -> io::Result<usize> {
        debug!(
            trace_id = %trace_id,
            peer = %response.remote_addr(),
            length = response.len(),
            "Writing response"
        );
        writer.send_to(response.payload(), response.remote_addr())
    }
}
