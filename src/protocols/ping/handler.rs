//! Ping protocol request handler.

use bytes::Bytes;
use tracing::{debug, warn};

use super::parser::{self, Command, ParseResult};
use crate::handler::{Dispatch, RequestHandler};
use crate::message::{Datagram, Request, Response};
use crate::protocols::read_datagram;
use crate::runtime::socket::{DatagramReader, ReadError};
use crate::trace::TraceId;

/// Answers `PING` datagrams with `PONG`.
///
/// Deliberately simple: no state, one reply per datagram. Unknown commands
/// get an error reply rather than silence so clients can tell the server is
/// alive but confused.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingHandler;

impl RequestHandler<DatagramReader> for PingHandler {
    fn read(&self, trace_id: &TraceId, reader: &mut DatagramReader) -> Result<Datagram, ReadError> {
        read_datagram(trace_id, reader)
    }

    fn process(&self, trace_id: &TraceId, request: Request, dispatcher: &dyn Dispatch) {
        let reply = match parser::parse(request.data()) {
            ParseResult::Complete(Command::Ping) => Bytes::from_static(parser::response_pong()),
            ParseResult::Complete(Command::PingMsg(msg)) => {
                Bytes::from(parser::response_pong_msg(&msg))
            }
            ParseResult::Error => {
                warn!(
                    trace_id = %trace_id,
                    peer = %request.remote_addr(),
                    length = request.len(),
                    "Unknown ping command"
                );
                Bytes::from_static(parser::response_error())
            }
        };

        debug!(trace_id = %trace_id, peer = %request.remote_addr(), "Replying");
        dispatcher.dispatch(trace_id, Response::reply(&request, reply));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::testing::RecordingDispatch;
    use bytes::BytesMut;
    use chrono::Utc;

    fn request(bytes: &[u8]) -> Request {
        let addr = "127.0.0.1:5555".parse().unwrap();
        Request::new(addr, BytesMut::from(bytes), bytes.len(), Utc::now()).unwrap()
    }

    fn reply_to(input: &[u8]) -> Vec<u8> {
        let dispatch = RecordingDispatch::default();
        PingHandler.process(&TraceId::new("t"), request(input), &dispatch);
        let responses = dispatch.responses.borrow();
        assert_eq!(responses.len(), 1);
        responses[0].payload().to_vec()
    }

    #[test]
    fn test_ping() {
        assert_eq!(reply_to(b"PING\r\n"), b"PONG\r\n");
        assert_eq!(reply_to(b"ping world"), b"PONG world\r\n");
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(reply_to(b"HELLO"), b"ERROR unknown command\r\n");
    }
}
