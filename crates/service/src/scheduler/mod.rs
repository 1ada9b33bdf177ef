//! Budget-aware payment scheduling
//!
//! Payment jobs are admitted against the user's budget, queued by priority
//! and executed by a bounded pool of workers with retries and backoff. The
//! queue lives in memory; the public surface does not expose it so another
//! backend can replace it later.

pub mod processor;
mod queue;
pub mod types;

pub use processor::PaymentScheduler;
pub use types::{ExecutionObserver, SchedulerDeps, SchedulerError, SchedulerResult};

#[cfg(test)]
pub use types::MockExecutionObserver;
