//! Paced job dispatching
//!
//! Work is submitted to a [`Dispatcher`], queued in FIFO order and drained by
//! a background scheduler in small randomized batches separated by randomized
//! pauses. Each submission returns a [`ResultHandle`] that resolves once its
//! job has run.

mod dispatcher;
mod job;
mod pacing;
mod scheduler;
pub mod shutdown;

pub use dispatcher::{Dispatcher, PooledResource};
pub use job::ResultHandle;
pub use pacing::Pacing;
pub use scheduler::SchedulerStats;
pub use shutdown::{ShutdownFuture, ShutdownPath, ShutdownTarget, SignalHook};
