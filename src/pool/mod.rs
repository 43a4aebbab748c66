//! Worker Thread Pool
//!
//! A fixed pool of OS threads fed by a bounded channel. The event loop
//! stays single-threaded; the pool exists for exactly one job: running
//! the destructors of large sorted sets off the loop thread, so a `del`
//! of a million-member set doesn't stall every connected client.
//!
//! Jobs own their data. By the time an entry is queued here it has been
//! removed from the store and detached from the TTL heap, so nothing on
//! the loop thread references it again.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Number of worker threads.
const NUM_WORKERS: usize = 4;

/// Bound on queued jobs; submission blocks once full.
const QUEUE_DEPTH: usize = 1024;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size worker pool.
#[derive(Debug)]
pub struct ThreadPool {
    sender: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawns the pool with the default worker count.
    pub fn new() -> Self {
        Self::with_workers(NUM_WORKERS)
    }

    /// Spawns a pool of `workers` threads.
    pub fn with_workers(workers: usize) -> Self {
        let (sender, receiver) = sync_channel::<Job>(QUEUE_DEPTH);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..workers.max(1))
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("emberkv-worker-{}", id))
                    .spawn(move || worker_loop(id, receiver))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Queues a job. Blocks when the queue is full (bounded handoff); if
    /// the workers are gone, the job runs by being dropped here, which
    /// for destructor jobs is the work itself.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.send(Box::new(job)) {
                debug!("worker pool is shut down, running job inline");
                (e.0)();
            }
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // closing the channel lets the workers drain and exit
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) {
    debug!(worker = id, "worker thread started");
    loop {
        let job = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        match job {
            Ok(job) => job(),
            Err(_) => break, // channel closed
        }
    }
    debug!(worker = id, "worker thread stopped");
}
