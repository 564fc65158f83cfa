//! Convenient re-exports for common KARYA types.
//!
//! This module provides a single import for most use cases:
//! ```
//! use karya_rs::prelude::*;
//! ```

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{TaskFuture, WorkerPool};
pub use crate::queue::MpmcQueue;
