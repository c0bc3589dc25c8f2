//! UDP transport handles.
//!
//! A `Listener` owns the bound socket and hands out exactly one
//! `DatagramReader` plus any number of `DatagramWriter`s, each over its own
//! duplicate of the socket descriptor.
//!
//! ## Closing a blocked reader
//!
//! The socket stays in blocking mode so writers get plain blocking
//! `send_to`. The reader instead receives with `MSG_DONTWAIT` and, when
//! nothing is queued, parks in a `mio::Poll` that watches the socket next to
//! a `mio::Waker`. `Closer::close` flips the shared flag and fires the waker,
//! so a reader parked in `recv_from` returns `ReadError::Closed` straight
//! away instead of waiting for one more datagram.

use bytes::BytesMut;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::fmt;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::message::Datagram;

const SOCKET_TOKEN: Token = Token(0);
const WAKER_TOKEN: Token = Token(1);

/// Options applied to the socket before it is bound.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Set `SO_REUSEADDR`.
    pub reuse_address: bool,
    /// `SO_RCVBUF` in bytes, kernel default when `None`.
    pub recv_buffer_size: Option<usize>,
    /// `SO_SNDBUF` in bytes, kernel default when `None`.
    pub send_buffer_size: Option<usize>,
    /// Receive buffer size used by `DatagramReader::recv_datagram`.
    pub max_datagram_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            reuse_address: false,
            recv_buffer_size: None,
            send_buffer_size: None,
            max_datagram_size: 65_507,
        }
    }
}

/// State shared between the listener, its reader and every closer.
struct Shared {
    closed: AtomicBool,
    waker: OnceLock<Waker>,
}

/// A bound UDP socket, not yet split into reader and writer.
pub struct Listener {
    socket: UdpSocket,
    shared: Arc<Shared>,
    max_datagram_size: usize,
}

impl Listener {
    /// Create and bind a datagram socket.
    pub fn bind(addr: SocketAddr, options: &SocketOptions) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

        socket.set_reuse_address(options.reuse_address)?;
        if let Some(size) = options.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(size) = options.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }
        socket.bind(&addr.into())?;

        Ok(Self {
            socket: socket.into(),
            shared: Arc::new(Shared {
                closed: AtomicBool::new(false),
                waker: OnceLock::new(),
            }),
            max_datagram_size: options.max_datagram_size,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Create the read side. A listener has exactly one reader; a second
    /// call fails with `AlreadyExists`.
    pub fn reader(&self) -> io::Result<DatagramReader> {
        let socket = self.socket.try_clone()?;
        let poll = Poll::new()?;

        let fd = socket.as_raw_fd();
        poll.registry()
            .register(&mut SourceFd(&fd), SOCKET_TOKEN, Interest::READABLE)?;

        let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;
        self.shared.waker.set(waker).map_err(|_| {
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "listener already has a reader",
            )
        })?;

        Ok(DatagramReader {
            socket,
            poll,
            events: Events::with_capacity(4),
            shared: Arc::clone(&self.shared),
            max_datagram_size: self.max_datagram_size,
        })
    }

    /// Create a write side. Writers may be shared across threads.
    pub fn writer(&self) -> io::Result<DatagramWriter> {
        Ok(DatagramWriter {
            socket: self.socket.try_clone()?,
        })
    }

    /// Handle that closes this listener's read side from any thread.
    pub fn closer(&self) -> Closer {
        Closer {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Closes a listener's read side.
#[derive(Clone)]
pub struct Closer {
    shared: Arc<Shared>,
}

impl Closer {
    /// Close the listener. Idempotent.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(waker) = self.shared.waker.get() {
            if let Err(e) = waker.wake() {
                warn!(error = %e, "Failed to wake reader");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Closer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closer")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Why a read returned without a datagram.
#[derive(Debug)]
pub enum ReadError {
    /// The listener was closed. Clean shutdown, not a fault.
    Closed,
    /// Any other receive failure.
    Io(io::Error),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Closed => write!(f, "listener closed"),
            ReadError::Io(e) => write!(f, "receive failed: {e}"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Closed => None,
            ReadError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        ReadError::Io(e)
    }
}

/// Read side of a listener.
pub struct DatagramReader {
    socket: UdpSocket,
    poll: Poll,
    events: Events,
    shared: Arc<Shared>,
    max_datagram_size: usize,
}

impl DatagramReader {
    /// Receive one datagram into the spare capacity of `buf`.
    ///
    /// Blocks until a datagram arrives or the listener is closed. Bytes
    /// past the spare capacity are discarded by the kernel.
    pub fn recv_from(&mut self, buf: &mut BytesMut) -> Result<(usize, SocketAddr), ReadError> {
        loop {
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(ReadError::Closed);
            }

            let received = SockRef::from(&self.socket)
                .recv_from_with_flags(buf.spare_capacity_mut(), libc::MSG_DONTWAIT);
            match received {
                Ok((n, addr)) => {
                    // SAFETY: recvfrom initialised the first `n` bytes of the
                    // spare capacity.
                    unsafe { buf.set_len(buf.len() + n) };

                    let addr = addr.as_socket().ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidData, "sender is not an IP address")
                    })?;
                    return Ok((n, addr));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => self.wait()?,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ReadError::Io(e)),
            }
        }
    }

    /// Receive one datagram into a fresh buffer of the configured maximum
    /// datagram size.
    pub fn recv_datagram(&mut self) -> Result<Datagram, ReadError> {
        let mut data = BytesMut::with_capacity(self.max_datagram_size);
        let (length, remote_addr) = self.recv_from(&mut data)?;
        Ok(Datagram {
            remote_addr,
            data,
            length,
        })
    }

    pub fn max_datagram_size(&self) -> usize {
        self.max_datagram_size
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Park until the socket becomes readable or the waker fires.
    fn wait(&mut self) -> io::Result<()> {
        match self.poll.poll(&mut self.events, None) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }

        for event in self.events.iter() {
            if event.token() == WAKER_TOKEN {
                debug!("Reader woken");
            }
        }
        Ok(())
    }
}

/// Write side of a listener.
#[derive(Debug)]
pub struct DatagramWriter {
    socket: UdpSocket,
}

impl DatagramWriter {
    /// Send one datagram. A datagram send is a single system call, so
    /// concurrent callers never interleave bytes.
    pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
