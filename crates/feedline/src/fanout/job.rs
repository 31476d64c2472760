use crate::{
    error::StoreError,
    types::{ContentId, UserId},
};
use core::fmt;
use serde::{Deserialize, Serialize};

/// What a fan-out job does for its follower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Insert the content into the follower's home feed.
    FeedInsert,
    /// Submit a push notification to the follower.
    PushNotify,
}

impl JobKind {
    pub const ALL: [Self; 2] = [Self::FeedInsert, Self::PushNotify];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FeedInsert => "feed_insert",
            Self::PushNotify => "push_notify",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of propagation work for one follower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutJob {
    pub content_id: ContentId,
    pub author_id: UserId,
    pub target_follower_id: UserId,
    pub kind: JobKind,
}

/// Payload handed to the external push system by a `PushNotify` job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    pub recipient: UserId,
    pub content_id: ContentId,
    pub author_id: UserId,
}

impl From<&FanoutJob> for PushNotification {
    fn from(job: &FanoutJob) -> Self {
        Self {
            recipient: job.target_follower_id,
            content_id: job.content_id,
            author_id: job.author_id,
        }
    }
}

/// A chunk of followers that share content, author and job kind.
///
/// Batches are the unit that travels through the worker queues; one batch
/// expands into one job per follower.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FanoutBatch {
    pub content_id: ContentId,
    pub author_id: UserId,
    pub kind: JobKind,
    pub followers: Vec<UserId>,
}

impl FanoutBatch {
    pub fn jobs(&self) -> impl Iterator<Item = FanoutJob> + '_ {
        self.followers.iter().map(|&follower| FanoutJob {
            content_id: self.content_id,
            author_id: self.author_id,
            target_follower_id: follower,
            kind: self.kind,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.followers.len()
    }
}

/// Lifecycle of a single job.
///
/// ```text
/// Created -> Enqueued -> Running -> Succeeded
///                           |
///                           +-> RetryableFailure -> Enqueued (attempts < max)
///                           |                    -> TerminalFailure (attempts == max)
///                           +-> TerminalFailure
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Enqueued,
    Running,
    Succeeded,
    RetryableFailure,
    TerminalFailure,
}

impl JobState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::TerminalFailure)
    }
}

/// Why a job attempt failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FanoutError {
    /// Worth another attempt: transient store failure or attempt timeout.
    #[error("retryable: {0}")]
    Retryable(String),
    /// Retrying cannot help.
    #[error("terminal: {0}")]
    Terminal(String),
}

impl FanoutError {
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl From<StoreError> for FanoutError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            Self::Retryable(err.to_string())
        } else {
            Self::Terminal(err.to_string())
        }
    }
}

/// Outcome of a job, emitted once it reaches a terminal state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
    pub job: FanoutJob,
    /// Either [`JobState::Succeeded`] or [`JobState::TerminalFailure`].
    pub state: JobState,
    pub attempts: u32,
    /// The last failure, if the job did not succeed.
    pub error: Option<FanoutError>,
}

/// Tracks one job through its state machine.
#[derive(Debug)]
pub(crate) struct JobRun {
    pub(crate) job: FanoutJob,
    state: JobState,
    attempts: u32,
    last_error: Option<FanoutError>,
}

impl JobRun {
    pub(crate) const fn new(job: FanoutJob) -> Self {
        Self {
            job,
            state: JobState::Created,
            attempts: 0,
            last_error: None,
        }
    }

    pub(crate) const fn state(&self) -> JobState {
        self.state
    }

    pub(crate) const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn enqueue(&mut self) {
        debug_assert!(matches!(
            self.state,
            JobState::Created | JobState::RetryableFailure
        ));
        self.state = JobState::Enqueued;
    }

    pub(crate) fn start(&mut self) {
        debug_assert_eq!(self.state, JobState::Enqueued);
        self.attempts += 1;
        self.state = JobState::Running;
    }

    /// Records the result of the current attempt and returns the new state.
    ///
    /// A retryable failure on the last permitted attempt is terminal.
    pub(crate) fn finish(
        &mut self,
        outcome: Result<(), FanoutError>,
        max_attempts: u32,
    ) -> JobState {
        debug_assert_eq!(self.state, JobState::Running);
        self.state = match outcome {
            Ok(()) => JobState::Succeeded,
            Err(err) => {
                let state = if err.is_retryable() && self.attempts < max_attempts {
                    JobState::RetryableFailure
                } else {
                    JobState::TerminalFailure
                };
                self.last_error = Some(err);
                state
            }
        };
        self.state
    }

    /// Gives up on a job that is waiting for its next attempt.
    pub(crate) fn abandon(&mut self) {
        debug_assert_eq!(self.state, JobState::RetryableFailure);
        self.state = JobState::TerminalFailure;
    }

    pub(crate) fn last_error(&self) -> Option<&FanoutError> {
        self.last_error.as_ref()
    }

    /// Only valid once the job is terminal.
    pub(crate) fn into_report(self) -> JobReport {
        debug_assert!(self.state.is_terminal());
        JobReport {
            job: self.job,
            state: self.state,
            attempts: self.attempts,
            error: match self.state {
                JobState::Succeeded => None,
                _ => self.last_error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> FanoutJob {
        FanoutJob {
            content_id: ContentId(1),
            author_id: UserId(2),
            target_follower_id: UserId(3),
            kind: JobKind::FeedInsert,
        }
    }

    #[test]
    fn retryable_failures_retry_until_the_ceiling() {
        let mut run = JobRun::new(job());
        assert_eq!(run.state(), JobState::Created);

        for attempt in 1..3 {
            run.enqueue();
            run.start();
            assert_eq!(run.attempts(), attempt);
            let state = run.finish(Err(FanoutError::Retryable("blip".into())), 3);
            assert_eq!(state, JobState::RetryableFailure);
        }

        run.enqueue();
        run.start();
        let state = run.finish(Err(FanoutError::Retryable("blip".into())), 3);
        assert_eq!(state, JobState::TerminalFailure);

        let report = run.into_report();
        assert_eq!(report.attempts, 3);
        assert_eq!(report.error, Some(FanoutError::Retryable("blip".into())));
    }

    #[test]
    fn terminal_failure_stops_immediately() {
        let mut run = JobRun::new(job());
        run.enqueue();
        run.start();
        let state = run.finish(Err(FanoutError::Terminal("bad row".into())), 3);
        assert_eq!(state, JobState::TerminalFailure);
        assert_eq!(run.attempts(), 1);
    }

    #[test]
    fn success_after_retry_clears_the_reported_error() {
        let mut run = JobRun::new(job());
        run.enqueue();
        run.start();
        run.finish(Err(FanoutError::Retryable("blip".into())), 3);
        run.enqueue();
        run.start();
        assert_eq!(run.finish(Ok(()), 3), JobState::Succeeded);

        let report = run.into_report();
        assert_eq!(report.state, JobState::Succeeded);
        assert_eq!(report.attempts, 2);
        assert!(report.error.is_none());
    }

    #[test]
    fn store_errors_classify_by_transience() {
        assert!(FanoutError::from(StoreError::Timeout).is_retryable());
        assert!(!FanoutError::from(StoreError::Constraint("fk".into())).is_retryable());
    }

    #[test]
    fn batch_expands_into_one_job_per_follower() {
        let batch = FanoutBatch {
            content_id: ContentId(9),
            author_id: UserId(1),
            kind: JobKind::PushNotify,
            followers: vec![UserId(4), UserId(5)],
        };
        let jobs: Vec<_> = batch.jobs().collect();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].target_follower_id, UserId(5));
        assert!(jobs.iter().all(|job| job.kind == JobKind::PushNotify));
    }
}
