//! Protocol implementations.
//!
//! Each protocol is a `RequestHandler` over the UDP `DatagramReader`, served
//! by the generic server with `UdpBinder` and `UdpWriter`.
//!
//! - `header`: 20-byte datagrams with an 8-byte binary header
//! - `ping`: `PING` / `PONG` health checks
//! - `echo`: sends every datagram back to its sender

pub mod echo;
pub mod header;
pub mod ping;

use tracing::{debug, error};

use crate::message::Datagram;
use crate::runtime::socket::{DatagramReader, ReadError};
use crate::trace::TraceId;

/// Block for the next datagram, logging the outcome.
pub(crate) fn read_datagram(
    trace_id: &TraceId,
    reader: &mut DatagramReader,
) -> Result<Datagram, ReadError> {
    debug!(trace_id = %trace_id, "Waiting for datagram");

    match reader.recv_datagram() {
        Ok(datagram) => {
            debug!(
                trace_id = %trace_id,
                peer = %datagram.remote_addr,
                length = datagram.length,
                "Datagram read"
            );
            Ok(datagram)
        }
        Err(ReadError::Closed) => Err(ReadError::Closed),
        Err(e) => {
            error!(trace_id = %trace_id, error = %e, "Datagram read failed");
            Err(e)
        }
    }
}
