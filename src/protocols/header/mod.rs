//! Header protocol implementation.
//!
//! Fixed-size binary datagrams, each carrying an 8-byte header followed by
//! 12 bytes of body:
//!
//! ```text
//! offset  size  field
//! 0       1     version
//! 1       1     transaction id
//! 2       1     op code
//! 3       1     status code
//! 4       4     stream handle (big-endian)
//! 8       12    body
//! ```
//!
//! A valid datagram is acknowledged with `GOT IT` to its sender. A datagram
//! of any other length is logged and left unanswered.

pub mod handler;
pub mod parser;

pub use handler::HeaderHandler;
