//! UDP server lifecycle.
//!
//! Wires the pipeline together: binder → reader thread → worker pool →
//! request handler → dispatcher → response handler.
//!
//! ```text
//! Created ──start──▶ Bound ──▶ Running ──listener closed──▶ Draining ──pool joined──▶ Stopped
//! ```
//!
//! Shutdown is cooperative. Closing the listener makes the reader's blocked
//! receive return `ReadError::Closed`; the reader stops taking datagrams and
//! the pool finishes whatever is in flight or queued before the server stops.

use chrono::Utc;
use std::any::Any;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::handler::{Binder, Dispatch, RequestHandler, ResponseHandler};
use crate::message::Request;
use crate::runtime::dispatch::Dispatcher;
use crate::runtime::pool::{Submit, WorkerPool};
use crate::runtime::socket::{Closer, Listener, ReadError};
use crate::runtime::stats::{Stats, StatsSnapshot};
use crate::trace::TraceId;

/// Server lifecycle state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    /// Configured, nothing started.
    Created,
    /// Reader and writer handles exist.
    Bound,
    /// Reader loop and workers active.
    Running,
    /// Listener closed; in-flight requests finishing.
    Draining,
    /// All threads joined.
    Stopped,
}

struct StateCell {
    state: Mutex<State>,
}

impl StateCell {
    fn new() -> Self {
        Self {
            state: Mutex::new(State::Created),
        }
    }

    fn get(&self) -> State {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, next: State) -> Result<(), ServerError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if next <= *state {
            return Err(ServerError::InvalidTransition {
                from: *state,
                to: next,
            });
        }
        debug!(from = ?*state, to = ?next, "Server state changed");
        *state = next;
        Ok(())
    }
}

/// Server errors. Only startup can fail; once running, every per-datagram
/// fault is logged and contained.
#[derive(Debug)]
pub enum ServerError {
    Bind(io::Error),
    Spawn(io::Error),
    InvalidTransition { from: State, to: State },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Bind(e) => write!(f, "Failed to bind listener: {e}"),
            ServerError::Spawn(e) => write!(f, "Failed to spawn server thread: {e}"),
            ServerError::InvalidTransition { from, to } => {
                write!(f, "Invalid server state transition {from:?} -> {to:?}")
            }
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind(e) | ServerError::Spawn(e) => Some(e),
            ServerError::InvalidTransition { .. } => None,
        }
    }
}

/// A request travelling from the reader to a worker.
struct Job {
    trace_id: TraceId,
    request: Request,
}

/// Server instance, not yet started.
pub struct Server<B, Q, R> {
    config: Config,
    binder: B,
    requests: Q,
    responses: R,
    state: Arc<StateCell>,
    stats: Arc<Stats>,
}

impl<B, Q, R> Server<B, Q, R>
where
    B: Binder,
    Q: RequestHandler<B::Reader>,
    R: ResponseHandler<B::Writer>,
{
    /// Create a new server instance
    pub fn new(config: Config, binder: B, requests: Q, responses: R) -> Self {
        Server {
            config,
            binder,
            requests,
            responses,
            state: Arc::new(StateCell::new()),
            stats: Arc::new(Stats::new()),
        }
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    /// Bind the socket, start the workers and the reader thread.
    ///
    /// `trace_id` is the base every request's trace id is derived from.
    pub fn start(self, trace_id: TraceId) -> Result<ServerHandle, ServerError> {
        let Server {
            config,
            binder,
            requests,
            responses,
            state,
            stats,
        } = self;

        let listener =
            Listener::bind(config.listen, &config.socket_options()).map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;

        let (reader, writer) = binder
            .bind(&trace_id, &listener)
            .map_err(ServerError::Bind)?;
        state.advance(State::Bound)?;

        let requests = Arc::new(requests);
        let dispatcher = Dispatcher::new(writer, responses, Arc::clone(&stats));

        let pool = {
            let requests = Arc::clone(&requests);
            let stats = Arc::clone(&stats);
            WorkerPool::new(
                config.workers,
                config.queue_capacity,
                config.backpressure,
                move |worker_id, job: Job| {
                    run_job::<B::Reader, Q>(worker_id, job, &requests, &dispatcher, &stats);
                },
            )
            .map_err(ServerError::Spawn)?
        };

        state.advance(State::Running)?;

        info!(
            trace_id = %trace_id,
            addr = %local_addr,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            backpressure = ?config.backpressure,
            "Server listening"
        );

        let spawned = {
            let state = Arc::clone(&state);
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name("udp-reader".to_string())
                .spawn(move || {
                    read_loop(&trace_id, reader, requests.as_ref(), &pool, &stats);

                    if let Err(e) = state.advance(State::Draining) {
                        error!(error = %e, "Failed to enter draining state");
                    }
                    pool.join();
                    if let Err(e) = state.advance(State::Stopped) {
                        error!(error = %e, "Failed to enter stopped state");
                    }
                    info!(trace_id = %trace_id, "Server stopped");
                })
        };
        // On failure the unspawned closure is dropped, and the pool with it,
        // which joins the workers.
        let reader_thread = spawned.map_err(|e| abandon_start(&state, e))?;

        Ok(ServerHandle {
            local_addr,
            closer: listener.closer(),
            _listener: listener,
            state,
            stats,
            reader_thread: Some(reader_thread),
        })
    }
}

/// Handle to a running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    closer: Closer,
    _listener: Listener,
    state: Arc<StateCell>,
    stats: Arc<Stats>,
    reader_thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Closer usable from other threads, e.g. a signal handler.
    pub fn closer(&self) -> Closer {
        self.closer.clone()
    }

    /// Request shutdown without waiting for it.
    pub fn close(&self) {
        info!(addr = %self.local_addr, "Closing listener");
        self.closer.close();
    }

    /// Wait until the server has stopped and return the final counters.
    pub fn wait(mut self) -> StatsSnapshot {
        self.join_reader();
        self.stats.snapshot()
    }

    /// Close the listener and wait for in-flight requests to finish.
    pub fn shutdown(self) -> StatsSnapshot {
        self.close();
        self.wait()
    }

    fn join_reader(&mut self) {
        if let Some(reader_thread) = self.reader_thread.take() {
            if reader_thread.join().is_err() {
                error!("Reader thread exited by panic");
            }
        }
    }
}

/// A handle dropped without `wait` or `shutdown` stops the server.
impl Drop for ServerHandle {
    fn drop(&mut self) {
        if self.reader_thread.is_some() {
            self.close();
            self.join_reader();
        }
    }
}

/// Move a server whose reader never started straight to `Stopped`.
fn abandon_start(state: &StateCell, e: io::Error) -> ServerError {
    for next in [State::Draining, State::Stopped] {
        if let Err(err) = state.advance(next) {
            error!(error = %err, "Failed to stop server after startup failure");
        }
    }
    ServerError::Spawn(e)
}

/// Pause before the next read after `consecutive` failed reads in a row.
fn read_backoff(consecutive: u32) -> Duration {
    if consecutive <= 1 {
        return Duration::ZERO;
    }
    let millis = 1u64 << (consecutive - 2).min(7);
    Duration::from_millis(millis)
}

fn read_loop<R, Q>(
    trace_id: &TraceId,
    mut reader: R,
    requests: &Q,
    pool: &WorkerPool<Job>,
    stats: &Stats,
) where
    Q: RequestHandler<R>,
{
    debug!(trace_id = %trace_id, "Reader started");

    let mut failures = 0u32;
    for seq in 0u64.. {
        let trace_id = trace_id.child(seq);

        let datagram = match requests.read(&trace_id, &mut reader) {
            Ok(datagram) => {
                failures = 0;
                datagram
            }
            Err(ReadError::Closed) => {
                info!(trace_id = %trace_id, "Listener closed, draining");
                break;
            }
            Err(ReadError::Io(e)) => {
                stats.record_read_error();
                failures = failures.saturating_add(1);
                if failures.is_power_of_two() {
                    error!(trace_id = %trace_id, error = %e, failures, "Read failed");
                } else {
                    debug!(trace_id = %trace_id, error = %e, failures, "Read failed");
                }
                thread::sleep(read_backoff(failures));
                continue;
            }
        };

        let peer = datagram.remote_addr;
        let length = datagram.length;
        let request = match Request::from_datagram(datagram, Utc::now()) {
            Ok(request) => request,
            Err(e) => {
                stats.record_read_error();
                warn!(trace_id = %trace_id, peer = %peer, length, error = %e, "Discarding datagram");
                continue;
            }
        };

        stats.record_received();
        trace!(trace_id = %trace_id, peer = %peer, length, "Datagram received");

        match pool.submit(Job { trace_id, request }) {
            Submit::Queued => {}
            Submit::Dropped(job) => {
                stats.record_dropped();
                warn!(
                    trace_id = %job.trace_id,
                    peer = %peer,
                    length,
                    "Request queue full, dropping request"
                );
            }
            Submit::Closed(job) => {
                error!(trace_id = %job.trace_id, "Worker pool closed, stopping reader");
                break;
            }
        }
    }
}

fn run_job<R, Q>(
    worker_id: usize,
    job: Job,
    requests: &Q,
    dispatcher: &dyn Dispatch,
    stats: &Stats,
) where
    Q: RequestHandler<R>,
{
    let Job { trace_id, request } = job;
    let peer = request.remote_addr();
    let length = request.len();

    trace!(trace_id = %trace_id, worker = worker_id, peer = %peer, length, "Processing request");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        requests.process(&trace_id, request, dispatcher)
    }));

    match outcome {
        Ok(()) => stats.record_processed(),
        Err(payload) => {
            stats.record_panicked();
            error!(
                trace_id = %trace_id,
                worker = worker_id,
                peer = %peer,
                length,
                panic = panic_message(payload.as_ref()),
                "Request processor panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
