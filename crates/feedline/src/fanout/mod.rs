//! Background propagation of new content to followers.
//!
//! The write path hands a follower snapshot to [`Dispatcher::dispatch`],
//! which splits it into [`FanoutBatch`]es and routes them round-robin onto
//! bounded per-worker queues without awaiting. Each worker runs the jobs of
//! one batch concurrently, retrying transient failures with capped
//! exponential backoff up to `max_attempts`.
//!
//! Failures here are operational: they are logged (and optionally reported
//! via [`Dispatcher::subscribe`]) but never surface to the request that
//! created the content.

mod config;
mod dispatcher;
mod job;
mod pool;
mod retry;
mod worker;

pub use config::*;
pub use dispatcher::*;
pub use job::{
    FanoutBatch, FanoutError, FanoutJob, JobKind, JobReport, JobState, PushNotification,
};
pub use retry::*;
pub use worker::REPORT_BUFFER;
