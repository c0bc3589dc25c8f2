//! Ping protocol implementation.
//!
//! A minimal protocol for health checks and latency measurement:
//! - Client sends: `PING` or `PING <message>` in one datagram
//! - Server responds: `PONG\r\n` or `PONG <message>\r\n`
//!
//! ## Use Cases
//!
//! 1. **Health checks**: Monitoring can verify the server is reading and
//!    the worker pool is answering.
//!
//! 2. **Latency measurement**: Measures network + pipeline overhead (reader,
//!    queue handoff, worker, write) with no protocol work in between.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  PING
//! Response: PONG\r\n
//!
//! Request:  PING hello
//! Response: PONG hello\r\n
//! ```

pub mod handler;
pub mod parser;

pub use handler::PingHandler;
