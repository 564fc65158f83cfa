//! KARYA - Kinetic Asynchronous Runtime for Your Applications
//!
//! A task execution pool built on a hand-written lock-free
//! Michael-Scott MPMC queue with hazard-pointer memory reclamation.
//!
//! # Quick Start
//!
//! ```no_run
//! use karya_rs::prelude::*;
//!
//! let pool = WorkerPool::new().unwrap();
//!
//! let future = pool.submit(|| (1..=100u64).sum::<u64>()).unwrap();
//! println!("sum = {}", future.get().unwrap());
//! ```
//!
//! # Features
//!
//! - **Lock-Free Queue**: Michael-Scott linked FIFO, safe for any
//!   number of concurrent producers and consumers
//! - **Hazard-Pointer Reclamation**: unlinked queue cells are freed
//!   only once no thread can still reference them
//! - **Lost-Wakeup-Free Sleeping**: workers sleep on an event count
//!   snapshotted before every dequeue attempt
//! - **Draining Shutdown**: stopping the pool rejects new work but
//!   runs everything already queued
//! - **Panic Isolation**: a panicking task surfaces through its future,
//!   never through the worker
//! - **Telemetry**: task counters and latency percentiles (optional)

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

// Core modules - always available
pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod queue;
pub mod telemetry;
pub mod util;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{TaskFuture, TaskId, WorkerPool};
pub use queue::{drain_retired, MpmcQueue};
