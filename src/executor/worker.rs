// worker thread loop
use super::task::{TaskEnvelope, TaskOutcome};
use super::wake::WakeCoordinator;
use crate::queue::MpmcQueue;
use crate::telemetry::Metrics;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

// stats for each worker
#[derive(Debug)]
pub struct WorkerState {
    pub tasks_executed: AtomicU64,
    pub tasks_panicked: AtomicU64,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
        }
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub state: Arc<WorkerState>,
    metrics: Arc<Metrics>,
}

impl Worker {
    pub fn new(id: WorkerId, metrics: Arc<Metrics>) -> Self {
        Self {
            id,
            state: Arc::new(WorkerState::new()),
            metrics,
        }
    }

    // main loop
    pub fn run(&self, queue: Arc<MpmcQueue<TaskEnvelope>>, wake: Arc<WakeCoordinator>) {
        loop {
            // The snapshot must precede the fast-path drain: a wake
            // published while we drain then differs from `seen`, and
            // the wait below returns instead of sleeping.
            let seen = wake.current_seq();

            if !self.drain(&queue) {
                return;
            }

            if wake.stop_requested() {
                // Draining shutdown: queued tasks still run.
                self.drain(&queue);
                return;
            }

            wake.wait_until_changed(seen);
        }
    }

    /// Dequeues and executes until the queue reads empty. Returns false
    /// only if the queue became unusable for this thread.
    fn drain(&self, queue: &MpmcQueue<TaskEnvelope>) -> bool {
        loop {
            match queue.try_dequeue() {
                Ok(Some(envelope)) => self.execute(envelope),
                Ok(None) => return true,
                Err(err) => {
                    eprintln!("karya-worker-{}: queue unusable: {}", self.id, err);
                    return false;
                }
            }
        }
    }

    fn execute(&self, envelope: TaskEnvelope) {
        let tid = envelope.id();
        let start = Instant::now();

        // The envelope already routes panics into the task's future;
        // the catch here keeps anything unexpected out of the loop.
        let outcome = catch_unwind(AssertUnwindSafe(|| envelope.invoke()));

        let duration_ns = start.elapsed().as_nanos() as u64;

        match outcome {
            Ok(Some(TaskOutcome::Panicked)) | Err(_) => {
                eprintln!("task {:?} panicked", tid);
                self.state.tasks_panicked.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_task_panic();
            }
            Ok(Some(TaskOutcome::Completed)) => {
                self.metrics.record_task_execution(duration_ns);
            }
            // Already consumed elsewhere; nothing ran.
            Ok(None) => return,
        }

        self.state.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }
}
