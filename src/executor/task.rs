//! Task representation: envelope and result handle.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether the wrapped computation ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    Completed,
    Panicked,
}

type TaskFn = Box<dyn FnOnce() -> TaskOutcome + Send>;

/// The unit the queue carries: a cloneable handle around a single-shot
/// computation. Clones share one computation; whichever worker dequeues
/// the envelope consumes it, and later invocations are no-ops.
#[derive(Clone)]
pub(crate) struct TaskEnvelope {
    id: TaskId,
    cell: Arc<Mutex<Option<TaskFn>>>,
}

impl TaskEnvelope {
    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    /// Runs the computation if this envelope still owns it.
    pub(crate) fn invoke(self) -> Option<TaskOutcome> {
        let func = self.cell.lock().take();
        func.map(|func| func())
    }
}

impl fmt::Debug for TaskEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEnvelope").field("id", &self.id).finish()
    }
}

struct FutureShared<R> {
    result: Mutex<Option<std::result::Result<R, String>>>,
    cond: Condvar,
}

impl<R> FutureShared<R> {
    fn complete(&self, result: std::result::Result<R, String>) {
        let mut slot = self.result.lock();
        *slot = Some(result);
        self.cond.notify_all();
    }
}

/// Handle to the result of a submitted task.
///
/// Obtained from [`WorkerPool::submit`](crate::WorkerPool::submit). The
/// task's side effects happen-before the result becomes visible here.
pub struct TaskFuture<R> {
    shared: Arc<FutureShared<R>>,
}

impl<R> TaskFuture<R> {
    /// Blocks until the task has completed or failed.
    pub fn wait(&self) {
        let mut slot = self.shared.result.lock();
        while slot.is_none() {
            self.shared.cond.wait(&mut slot);
        }
    }

    /// Non-blocking completion query.
    pub fn ready(&self) -> bool {
        self.shared.result.lock().is_some()
    }

    /// Blocks until the task finishes, then takes its result. A task
    /// that panicked surfaces here as
    /// [`Error::TaskPanicked`](crate::Error::TaskPanicked). Taking the
    /// handle by value makes the result single-take by construction.
    pub fn get(self) -> Result<R> {
        let mut slot = self.shared.result.lock();
        let result = loop {
            match slot.take() {
                Some(result) => break result,
                None => self.shared.cond.wait(&mut slot),
            }
        };
        result.map_err(Error::TaskPanicked)
    }
}

impl<R> fmt::Debug for TaskFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("ready", &self.ready())
            .finish()
    }
}

/// Couples a computation with the future observing its result. The
/// returned closure captures the completion side; panics inside `f` are
/// caught there and routed into the future, never into the caller.
pub(crate) fn envelope_pair<F, R>(f: F) -> (TaskEnvelope, TaskFuture<R>)
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let shared = Arc::new(FutureShared {
        result: Mutex::new(None),
        cond: Condvar::new(),
    });
    let completion = shared.clone();

    let envelope = TaskEnvelope {
        id: TaskId::next(),
        cell: Arc::new(Mutex::new(Some(Box::new(move || {
            match catch_unwind(AssertUnwindSafe(f)) {
                Ok(value) => {
                    completion.complete(Ok(value));
                    TaskOutcome::Completed
                }
                Err(payload) => {
                    completion.complete(Err(panic_message(payload.as_ref())));
                    TaskOutcome::Panicked
                }
            }
        })))),
    };

    (envelope, TaskFuture { shared })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_runs_once() {
        let (envelope, future) = envelope_pair(|| 42);
        let copy = envelope.clone();

        assert_eq!(envelope.invoke(), Some(TaskOutcome::Completed));
        assert_eq!(copy.invoke(), None);
        assert_eq!(future.get().unwrap(), 42);
    }

    #[test]
    fn test_future_ready_transitions() {
        let (envelope, future) = envelope_pair(|| "done");

        assert!(!future.ready());
        envelope.invoke();
        assert!(future.ready());
        future.wait();
        assert_eq!(future.get().unwrap(), "done");
    }

    #[test]
    fn test_panic_is_captured() {
        let (envelope, future) = envelope_pair(|| -> u32 { panic!("boom") });

        assert_eq!(envelope.invoke(), Some(TaskOutcome::Panicked));
        match future.get() {
            Err(Error::TaskPanicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected TaskPanicked, got {:?}", other),
        }
    }

    #[test]
    fn test_get_blocks_across_threads() {
        let (envelope, future) = envelope_pair(|| 7u64);

        let runner = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            envelope.invoke();
        });

        assert_eq!(future.get().unwrap(), 7);
        runner.join().unwrap();
    }
}
