//! Error types for the KARYA pool.

/// Result type alias for pool and queue operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the pool or the underlying queue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Submission was attempted after the pool was asked to stop. The
    /// task was not enqueued.
    #[error("pool stopped - submission rejected")]
    PoolStopped,

    /// Every hazard slot in the registry is reserved. The operation was
    /// not performed. Seeing this means far more threads touch queues
    /// than the registry was sized for.
    #[error("hazard registry capacity exhausted")]
    CapacityExhausted,

    /// The submitted computation panicked. Captured by the worker and
    /// surfaced through the task's future.
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Executor error
    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create an executor error
    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}
