//! Task execution infrastructure.
//!
//! This module provides the worker pool, the task envelope the queue
//! carries, the future handle submitters hold, and the event-count
//! wake protocol workers sleep on.

pub mod pool;
pub mod task;
pub(crate) mod wake;
pub mod worker;

pub use pool::WorkerPool;
pub use task::{TaskFuture, TaskId};
