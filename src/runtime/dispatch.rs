//! Response path shared by every worker.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::handler::{Completion, Dispatch, ResponseHandler};
use crate::message::Response;
use crate::runtime::stats::Stats;
use crate::trace::TraceId;

/// Runs the response handler against the shared writer handle.
///
/// One write attempt per response, never retried. The writer is only ever
/// borrowed shared, so `W: Sync` is what makes concurrent dispatch from
/// several workers sound.
pub struct Dispatcher<W, H> {
    writer: W,
    handler: H,
    stats: Arc<Stats>,
}

impl<W, H> Dispatcher<W, H>
where
    W: Send + Sync,
    H: ResponseHandler<W>,
{
    pub fn new(writer: W, handler: H, stats: Arc<Stats>) -> Self {
        Self {
            writer,
            handler,
            stats,
        }
    }
}

impl<W, H> Dispatch for Dispatcher<W, H>
where
    W: Send + Sync,
    H: ResponseHandler<W>,
{
    fn dispatch_with(
        &self,
        trace_id: &TraceId,
        response: Response,
        complete: Option<Completion<'_>>,
    ) {
        let result = self.handler.write(trace_id, &response, &self.writer);

        match &result {
            Ok(n) if *n == response.len() => {
                self.stats.record_written();
                debug!(
                    trace_id = %trace_id,
                    peer = %response.remote_addr(),
                    length = n,
                    "Response written"
                );
            }
            Ok(n) => {
                self.stats.record_written();
                warn!(
                    trace_id = %trace_id,
                    peer = %response.remote_addr(),
                    length = response.len(),
                    written = n,
                    "Short response write"
                );
            }
            Err(e) => {
                self.stats.record_write_error();
                error!(
                    trace_id = %trace_id,
                    peer = %response.remote_addr(),
                    length = response.len(),
                    error = %e,
                    "Response write failed"
                );
            }
        }

        if let Some(complete) = complete {
            complete(&response, &result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use std::thread;

    /// Records each write call as one entry.
    #[derive(Default)]
    struct RecordingWriter {
        writes: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    }

    struct RecordingHandler;

    impl ResponseHandler<RecordingWriter> for RecordingHandler {
        fn write(
            &self,
            _trace_id: &TraceId,
            response: &Response,
            writer: &RecordingWriter,
        ) -> io::Result<usize> {
            let payload = response.payload().to_vec();
            let len = payload.len();
            writer
                .writes
                .lock()
                .unwrap()
                .push((response.remote_addr(), payload));
            Ok(len)
        }
    }

    struct FailingHandler;

    impl ResponseHandler<()> for FailingHandler {
        fn write(&self, _: &TraceId, _: &Response, _: &()) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "network unreachable"))
        }
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([203, 0, 113, 5], port))
    }

    #[test]
    fn test_writes_exact_length_to_address() {
        let stats = Arc::new(Stats::new());
        let dispatcher = Dispatcher::new(
            RecordingWriter::default(),
            RecordingHandler,
            Arc::clone(&stats),
        );

        let response = Response::with_length(addr(4000), &b"GOT IT and more"[..], 6).unwrap();
        dispatcher.dispatch(&TraceId::new("t"), response);

        let writes = dispatcher.writer.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, addr(4000));
        assert_eq!(writes[0].1, b"GOT IT");
        assert_eq!(stats.snapshot().written, 1);
    }

    #[test]
    fn test_completion_sees_success() {
        let dispatcher = Dispatcher::new(
            RecordingWriter::default(),
            RecordingHandler,
            Arc::new(Stats::new()),
        );

        let mut seen = None;
        dispatcher.dispatch_with(
            &TraceId::new("t"),
            Response::new(addr(1), &b"abc"[..]),
            Some(Box::new(|response: &Response, result: &io::Result<usize>| {
                seen = Some((response.payload().to_vec(), *result.as_ref().unwrap()));
            })),
        );

        assert_eq!(seen, Some((b"abc".to_vec(), 3)));
    }

    #[test]
    fn test_completion_sees_failure() {
        let stats = Arc::new(Stats::new());
        let dispatcher = Dispatcher::new((), FailingHandler, Arc::clone(&stats));

        let mut failed = false;
        dispatcher.dispatch_with(
            &TraceId::new("t"),
            Response::new(addr(1), &b"abc"[..]),
            Some(Box::new(|response: &Response, result: &io::Result<usize>| {
                assert_eq!(response.len(), 3);
                failed = result.is_err();
            })),
        );

        assert!(failed);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.write_errors, 1);
        assert_eq!(snapshot.written, 0);
    }

    #[test]
    fn test_concurrent_dispatch_keeps_writes_whole() {
        let dispatcher = Arc::new(Dispatcher::new(
            RecordingWriter::default(),
            RecordingHandler,
            Arc::new(Stats::new()),
        ));

        let threads: Vec<_> = (0..8u8)
            .map(|id| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let payload = vec![id; 64];
                        let response = Response::new(addr(id as u16), payload);
                        dispatcher.dispatch(&TraceId::new("t"), response);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let writes = dispatcher.writer.writes.lock().unwrap();
        assert_eq!(writes.len(), 800);
        for (to, payload) in writes.iter() {
            assert_eq!(payload.len(), 64);
            let id = payload[0];
            assert!(payload.iter().all(|b| *b == id));
            assert_eq!(*to, addr(id as u16));
        }
    }
}
