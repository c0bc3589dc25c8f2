//! Header protocol request handler.

use std::io;
use tracing::{debug, warn};

use super::parser::{self, HEADER_LEN};
use crate::handler::{Dispatch, RequestHandler};
use crate::message::{Datagram, Request, Response};
use crate::protocols::read_datagram;
use crate::runtime::socket::{DatagramReader, ReadError};
use crate::trace::TraceId;

/// Decodes the header of each datagram and acknowledges it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderHandler;

impl HeaderHandler {
    pub fn new() -> Self {
        Self
    }
}

impl RequestHandler<DatagramReader> for HeaderHandler {
    fn read(&self, trace_id: &TraceId, reader: &mut DatagramReader) -> Result<Datagram, ReadError> {
        read_datagram(trace_id, reader)
    }

    fn process(&self, trace_id: &TraceId, request: Request, dispatcher: &dyn Dispatch) {
        debug!(
            trace_id = %trace_id,
            peer = %request.remote_addr(),
            length = request.len(),
            read_at = %request.read_at(),
            "Processing datagram"
        );

        let header = match parser::parse(request.data()) {
            Ok(header) => header,
            Err(e) => {
                warn!(
                    trace_id = %trace_id,
                    peer = %request.remote_addr(),
                    length = request.len(),
                    error = %e,
                    "Rejecting datagram"
                );
                return;
            }
        };

        debug!(
            trace_id = %trace_id,
            ?header,
            body_len = request.len() - HEADER_LEN,
            "Decoded header"
        );

        let response = Response::reply(&request, parser::response_ack());
        dispatcher.dispatch_with(
            trace_id,
            response,
            Some(Box::new(|response: &Response, result: &io::Result<usize>| {
                debug!(
                    trace_id = %trace_id,
                    peer = %response.remote_addr(),
                    length = response.len(),
                    ok = result.is_ok(),
                    "Acknowledgement complete"
                );
            })),
        );
    }
}
