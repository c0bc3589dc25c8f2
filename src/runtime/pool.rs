//! Fixed-size worker pool fed by a bounded FIFO queue.
//!
//! One producer (the reader thread) submits items; `workers` named threads
//! share the receiving end and run the job on each item they take. A worker
//! finishes its current item before taking the next, so everything an item
//! triggers (including response writes) happens before that worker moves on.
//!
//! When the queue is full the configured `Backpressure` decides: `Block`
//! parks the producer until a slot frees up, `Drop` hands the item back to
//! the producer as `Submit::Dropped` so it can be logged and counted.

use std::io;
use std::sync::mpsc::{self, Receiver, SendError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use crate::config::Backpressure;

/// Outcome of `WorkerPool::submit`.
#[derive(Debug, PartialEq, Eq)]
pub enum Submit<T> {
    /// The item is queued for a worker.
    Queued,
    /// The queue was full and the policy is `Drop`.
    Dropped(T),
    /// Every worker has exited.
    Closed(T),
}

/// Dropping the pool has the same effect as `join`.
pub struct WorkerPool<T> {
    sender: Option<SyncSender<T>>,
    backpressure: Backpressure,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `workers` threads named `worker-{id}` that run `job(worker_id, item)`
    /// for every submitted item.
    ///
    /// `queue_capacity` bounds the items waiting for a worker; 0 makes every
    /// submit a direct handoff to an idle worker.
    pub fn new<F>(
        workers: usize,
        queue_capacity: usize,
        backpressure: Backpressure,
        job: F,
    ) -> io::Result<Self>
    where
        F: Fn(usize, T) + Send + Sync + 'static,
    {
        if workers == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "worker pool needs at least one worker",
            ));
        }

        let (sender, receiver) = mpsc::sync_channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let job = Arc::new(job);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let receiver = Arc::clone(&receiver);
            let job = Arc::clone(&job);

            let handle = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &receiver, job.as_ref()))?;

            handles.push(handle);
        }

        debug!(workers, queue_capacity, ?backpressure, "Worker pool started");

        Ok(Self {
            sender: Some(sender),
            backpressure,
            workers: handles,
        })
    }

    /// Queue an item for the next free worker.
    pub fn submit(&self, item: T) -> Submit<T> {
        let Some(sender) = &self.sender else {
            return Submit::Closed(item);
        };
        match self.backpressure {
            Backpressure::Block => match sender.send(item) {
                Ok(()) => Submit::Queued,
                Err(SendError(item)) => Submit::Closed(item),
            },
            Backpressure::Drop => match sender.try_send(item) {
                Ok(()) => Submit::Queued,
                Err(TrySendError::Full(item)) => Submit::Dropped(item),
                Err(TrySendError::Disconnected(item)) => Submit::Closed(item),
            },
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting items, let the workers finish everything already
    /// queued, and wait for them to exit.
    pub fn join(mut self) {
        self.stop();
    }
}

impl<T> WorkerPool<T> {
    fn stop(&mut self) {
        if self.sender.take().is_none() {
            return;
        }

        for (worker_id, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() {
                error!(worker = worker_id, "Worker exited by panic");
            }
        }

        debug!("Worker pool stopped");
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<T>(
    worker_id: usize,
    receiver: &Mutex<Receiver<T>>,
    job: &(dyn Fn(usize, T) + Send + Sync),
) {
    debug!(worker = worker_id, "Worker started");

    loop {
        // The guard is a temporary of this statement: the lock is held only
        // while waiting for the next item.
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();

        match next {
            Ok(item) => job(worker_id, item),
            Err(_) => break,
        }
    }

    debug!(worker = worker_id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// A job that reports each item it starts and then parks until released.
    struct Gate {
        started: mpsc::Receiver<usize>,
        release: mpsc::Sender<()>,
    }

    fn gated_pool(
        queue_capacity: usize,
        backpressure: Backpressure,
    ) -> (WorkerPool<usize>, Gate, Arc<Mutex<Vec<usize>>>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let done = Arc::new(Mutex::new(Vec::new()));
        let done_clone = Arc::clone(&done);

        let pool = WorkerPool::new(1, queue_capacity, backpressure, move |_, item| {
            started_tx.send(item).unwrap();
            release_rx.lock().unwrap().recv().unwrap();
            done_clone.lock().unwrap().push(item);
        })
        .unwrap();

        let gate = Gate {
            started: started_rx,
            release: release_tx,
        };
        (pool, gate, done)
    }

    #[test]
    fn test_fifo_with_single_worker() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let pool = WorkerPool::new(1, 16, Backpressure::Block, move |_, item: usize| {
            seen_clone.lock().unwrap().push(item);
        })
        .unwrap();

        for i in 0..100 {
            assert_eq!(pool.submit(i), Submit::Queued);
        }
        pool.join();

        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_each_item_processed_exactly_once() {
        let counts: Arc<Vec<AtomicUsize>> =
            Arc::new((0..1000).map(|_| AtomicUsize::new(0)).collect());
        let counts_clone = Arc::clone(&counts);

        let pool = WorkerPool::new(4, 8, Backpressure::Block, move |_, item: usize| {
            counts_clone[item].fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(pool.workers(), 4);

        for i in 0..1000 {
            assert_eq!(pool.submit(i), Submit::Queued);
        }
        pool.join();

        assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_drop_when_full() {
        let (pool, gate, done) = gated_pool(1, Backpressure::Drop);

        assert_eq!(pool.submit(0), Submit::Queued);
        assert_eq!(gate.started.recv().unwrap(), 0);

        assert_eq!(pool.submit(1), Submit::Queued);
        assert_eq!(pool.submit(2), Submit::Dropped(2));

        gate.release.send(()).unwrap();
        gate.release.send(()).unwrap();
        pool.join();

        assert_eq!(*done.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_block_when_full() {
        let (pool, gate, done) = gated_pool(1, Backpressure::Block);
        let pool = Arc::new(pool);

        assert_eq!(pool.submit(0), Submit::Queued);
        assert_eq!(gate.started.recv().unwrap(), 0);
        assert_eq!(pool.submit(1), Submit::Queued);

        let (submitted_tx, submitted_rx) = mpsc::channel();
        let producer = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let outcome = pool.submit(2);
                submitted_tx.send(()).unwrap();
                outcome
            })
        };

        // The queue is full and the only worker is parked on item 0.
        assert!(submitted_rx.recv_timeout(Duration::from_millis(100)).is_err());

        gate.release.send(()).unwrap();
        assert_eq!(gate.started.recv().unwrap(), 1);
        submitted_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(producer.join().unwrap(), Submit::Queued);

        gate.release.send(()).unwrap();
        gate.release.send(()).unwrap();

        let pool = Arc::try_unwrap(pool).ok().unwrap();
        pool.join();
        assert_eq!(*done.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_join_drains_queue() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let pool = WorkerPool::new(1, 10, Backpressure::Block, move |_, _item: usize| {
            thread::sleep(Duration::from_millis(5));
            seen_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        for i in 0..5 {
            pool.submit(i);
        }
        pool.join();

        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_drop_drains_and_joins() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let pool = WorkerPool::new(2, 10, Backpressure::Block, move |_, _item: usize| {
            thread::sleep(Duration::from_millis(5));
            seen_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        for i in 0..6 {
            pool.submit(i);
        }
        drop(pool);

        assert_eq!(seen.load(Ordering::SeqCst), 6);
        // Only the test's handle is left once every worker has exited.
        assert_eq!(Arc::strong_count(&seen), 1);
    }

    #[test]
    fn test_rejects_zero_workers() {
        let result = WorkerPool::new(0, 1, Backpressure::Block, |_, _: usize| {});
        assert_eq!(result.err().unwrap().kind(), io::ErrorKind::InvalidInput);
    }
}
