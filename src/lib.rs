//! udp-kit: a UDP datagram server framework
//!
//! Applications plug in through three handler roles:
//! - `Binder`: exposes the listening socket as reader and writer handles
//! - `RequestHandler`: reads datagrams into requests and processes them
//! - `ResponseHandler`: writes responses back onto the socket
//!
//! The server runs one reader thread that feeds a bounded queue, a fixed pool
//! of worker threads that process requests, and a response path shared by
//! all workers. Closing the listener drains the pool and stops the server.
//!
//! Demonstration protocols live in `protocols`: a fixed binary header
//! protocol, ping, and echo.

pub mod config;
pub mod handler;
pub mod message;
pub mod protocols;
pub mod runtime;
pub mod server;
pub mod trace;

pub use config::{Backpressure, Config, ProtocolType};
pub use handler::{
    Binder, Completion, Dispatch, RequestHandler, ResponseHandler, UdpBinder, UdpWriter,
};
pub use message::{Datagram, Request, Response};
pub use server::{Server, ServerError, ServerHandle, State};
pub use trace::TraceId;
