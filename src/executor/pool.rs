//! Fixed-size worker pool over the MPMC queue.

use super::task::{self, TaskEnvelope, TaskFuture};
use super::wake::WakeCoordinator;
use super::worker::{Worker, WorkerState};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::{self, MpmcQueue};
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A pool of worker threads draining one shared lock-free queue.
///
/// Tasks are submitted from any thread (including worker threads, for
/// chaining) and each yields a [`TaskFuture`]. Stopping is cooperative
/// and draining: tasks already queued still run. Dropping the pool
/// stops it, joins every worker, and then reclaims all retired queue
/// cells; at that point no other thread in the process may still be
/// operating on a queue that shares the hazard registry.
pub struct WorkerPool {
    queue: Arc<MpmcQueue<TaskEnvelope>>,
    wake: Arc<WakeCoordinator>,
    // Serializes submissions against request_stop. Lock order is
    // submit section first, wake section second, never the reverse.
    submit_lock: Mutex<()>,
    workers: Vec<WorkerHandle>,
    num_threads: usize,
    metrics: Arc<Metrics>,
}

struct WorkerHandle {
    state: Arc<WorkerState>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerPool {
    /// Creates a pool with the default configuration (one worker per
    /// detected hardware thread).
    pub fn new() -> Result<Self> {
        Self::with_config(&Config::default())
    }

    /// Creates a pool from `config`.
    pub fn with_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();

        let queue = Arc::new(MpmcQueue::new());
        let wake = Arc::new(WakeCoordinator::new());
        let metrics = Arc::new(Metrics::new());

        let mut workers = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let worker = Worker::new(id, metrics.clone());
            let state = worker.state.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let worker_queue = queue.clone();
            let worker_wake = wake.clone();
            let spawned = builder
                .spawn(move || worker.run(worker_queue, worker_wake))
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)));

            match spawned {
                Ok(thread) => workers.push(WorkerHandle {
                    state,
                    thread: Some(thread),
                }),
                Err(err) => {
                    // Roll back the partial pool before reporting.
                    wake.publish_stop_all();
                    for worker in &mut workers {
                        if let Some(thread) = worker.thread.take() {
                            let _ = thread.join();
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            queue,
            wake,
            submit_lock: Mutex::new(()),
            workers,
            num_threads,
            metrics,
        })
    }

    /// Enqueues `f` for execution on some worker and returns the future
    /// observing its result.
    ///
    /// Fails with [`Error::PoolStopped`] once [`request_stop`] has been
    /// called, without enqueuing anything.
    ///
    /// [`request_stop`]: WorkerPool::request_stop
    pub fn submit<F, R>(&self, f: F) -> Result<TaskFuture<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        // Holding the submit section across stop-check, enqueue, and
        // wake guarantees no task is enqueued after a draining worker
        // has seen the stop flag.
        let _guard = self.submit_lock.lock();

        if self.wake.stop_requested() {
            return Err(Error::PoolStopped);
        }

        let (envelope, future) = task::envelope_pair(f);
        self.queue.enqueue(envelope)?;
        self.metrics.record_task_submitted();

        // The wake follows the successful enqueue, never precedes it.
        self.wake.publish_wake();

        Ok(future)
    }

    /// Asks the pool to stop. Idempotent. Queued and in-flight tasks
    /// still run to completion; new submissions fail.
    pub fn request_stop(&self) {
        let _guard = self.submit_lock.lock();
        self.wake.publish_stop_all();
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.num_threads
    }

    /// Point-in-time view of the pool's counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Tasks executed so far, summed over workers.
    pub fn tasks_executed(&self) -> u64 {
        self.workers
            .iter()
            .map(|w| {
                w.state
                    .tasks_executed
                    .load(std::sync::atomic::Ordering::Relaxed)
            })
            .sum()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.request_stop();

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }

        // Workers are joined, their retirement stores flushed to the
        // global list, and their hazard slots released. Nothing still
        // references a retired cell of this queue.
        unsafe { queue::drain_retired() };
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .field("stopped", &self.wake.stop_requested())
            .finish()
    }
}
