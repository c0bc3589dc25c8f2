//! Echo protocol request handler.

use tracing::trace;

use crate::handler::{Dispatch, RequestHandler};
use crate::message::{Datagram, Request, Response};
use crate::protocols::read_datagram;
use crate::runtime::socket::{DatagramReader, ReadError};
use crate::trace::TraceId;

/// Sends every datagram back to its sender, byte for byte.
///
/// No parsing at all, purely for throughput testing of the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl RequestHandler<DatagramReader> for EchoHandler {
    fn read(&self, trace_id: &TraceId, reader: &mut DatagramReader) -> Result<Datagram, ReadError> {
        read_datagram(trace_id, reader)
    }

    fn process(&self, trace_id: &TraceId, request: Request, dispatcher: &dyn Dispatch) {
        trace!(trace_id = %trace_id, length = request.len(), "Echoing datagram");
        let response = Response::reply(&request, request.data().clone());
        dispatcher.dispatch(trace_id, response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::testing::RecordingDispatch;
    use bytes::BytesMut;
    use chrono::Utc;

    #[test]
    fn test_echo() {
        let addr = "127.0.0.1:6000".parse().unwrap();
        let payload = b"\x00binary\xffpayload";
        let request =
            Request::new(addr, BytesMut::from(&payload[..]), payload.len(), Utc::now()).unwrap();

        let dispatch = RecordingDispatch::default();
        EchoHandler.process(&TraceId::new("t"), request, &dispatch);

        let responses = dispatch.responses.borrow();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].payload(), &payload[..]);
        assert_eq!(responses[0].remote_addr(), addr);
    }

    #[test]
    fn test_echo_empty_datagram() {
        let addr = "127.0.0.1:6000".parse().unwrap();
        let request = Request::new(addr, BytesMut::new(), 0, Utc::now()).unwrap();

        let dispatch = RecordingDispatch::default();
        EchoHandler.process(&TraceId::new("t"), request, &dispatch);

        assert!(dispatch.responses.borrow()[0].is_empty());
    }
}
