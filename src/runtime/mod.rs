//! Runtime for the datagram pipeline.
//!
//! - `socket`: bound listener, the closable reader and shared writer handles
//! - `pool`: fixed worker threads behind a bounded FIFO queue
//! - `dispatch`: the response path every worker writes through
//! - `stats`: counters updated along the pipeline
//!
//! One reader thread owns the read side; workers only ever touch the write
//! side, which they share.

pub mod dispatch;
pub mod pool;
pub mod socket;
pub mod stats;

pub use dispatch::Dispatcher;
pub use pool::{Submit, WorkerPool};
pub use socket::{Closer, DatagramReader, DatagramWriter, Listener, ReadError, SocketOptions};
pub use stats::{Stats, StatsSnapshot};
