//! Echo protocol implementation.
//!
//! A simple echo service for throughput and I/O testing: every datagram is
//! written back to its sender unchanged.
//!
//! ## Use Cases
//!
//! 1. **Throughput testing**: Measure how many datagrams per second the
//!    reader, queue and worker pool move without any protocol work.
//!
//! 2. **Variable payload sizes**: Exercise datagrams from empty up to
//!    `max_datagram_size` to check buffer handling and truncation.
//!
//! 3. **Correctness validation**: Verify data integrity by comparing
//!    echoed data against sent data.

pub mod handler;

pub use handler::EchoHandler;
