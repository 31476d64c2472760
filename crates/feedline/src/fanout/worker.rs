use super::{
    Backoff, FanoutError, FanoutJob, JobKind, JobReport, JobState, PushNotification,
    job::JobRun,
    pool::WorkRequest,
};
use crate::{
    store::{FeedSink, Notifier},
    telemetry,
};
use core::time::Duration;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Reports a subscriber can fall behind by before new ones are dropped for it.
pub const REPORT_BUFFER: usize = 1024;

/// Fan-out of [`JobReport`]s to every live subscriber.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Mutex<Vec<mpsc::Sender<JobReport>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self) -> mpsc::Receiver<JobReport> {
        let (tx, rx) = mpsc::channel(REPORT_BUFFER);
        self.senders.lock().push(tx);
        rx
    }

    /// Delivers `report` to every subscriber with room for it, forgetting
    /// the ones that hung up. Never waits on a slow reader.
    fn publish(&self, report: &JobReport) {
        let mut senders = self.senders.lock();
        if senders.is_empty() {
            return;
        }
        senders.retain(|tx| match tx.try_send(report.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!(job = ?report.job, "Report subscriber is full; dropping report");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

/// Everything a worker needs besides its queue.
pub(crate) struct WorkerContext<K, N> {
    pub(crate) sink: Arc<K>,
    pub(crate) notifier: Arc<N>,
    pub(crate) max_attempts: u32,
    pub(crate) job_timeout: Duration,
    pub(crate) backoff: Backoff,
    pub(crate) pending: Arc<AtomicUsize>,
    pub(crate) subscribers: Arc<Subscribers>,
    pub(crate) shutdown_token: CancellationToken,
}

/// Main execution loop for a fan-out worker task.
///
/// Processes one [`WorkRequest::Fanout`] batch at a time until the shared
/// token is cancelled, a [`WorkRequest::Shutdown`] arrives, or every sender
/// is gone. On exit the queue is closed and anything still in it is dropped
/// and logged before shutdown requests are acknowledged.
pub(crate) async fn worker_loop<K: FeedSink, N: Notifier>(
    worker_id: usize,
    mut rx: mpsc::Receiver<WorkRequest>,
    ctx: Arc<WorkerContext<K, N>>,
) {
    tracing::debug!(worker_id, "Fan-out worker started");
    let mut acks = Vec::new();

    loop {
        tokio::select! {
            biased;
            () = ctx.shutdown_token.cancelled() => break,
            request = rx.recv() => match request {
                Some(WorkRequest::Fanout(batch)) => {
                    let reports = join_all(batch.jobs().map(|job| run_job(worker_id, job, &ctx))).await;
                    let failed = reports
                        .iter()
                        .filter(|report| report.state == JobState::TerminalFailure)
                        .count();
                    tracing::debug!(
                        worker_id,
                        content_id = %batch.content_id,
                        kind = %batch.kind,
                        jobs = reports.len(),
                        failed,
                        "Fan-out batch finished"
                    );
                    ctx.pending.fetch_sub(1, Ordering::SeqCst);
                }
                Some(WorkRequest::Shutdown { response }) => {
                    tracing::debug!(worker_id, "Fan-out worker received shutdown signal");
                    acks.push(response);
                    break;
                }
                None => break,
            },
        }
    }

    rx.close();
    while let Ok(request) = rx.try_recv() {
        match request {
            WorkRequest::Fanout(batch) => {
                tracing::warn!(
                    worker_id,
                    content_id = %batch.content_id,
                    author_id = %batch.author_id,
                    kind = %batch.kind,
                    jobs = batch.len(),
                    "Dropping queued fan-out batch on shutdown"
                );
                telemetry::record_batch_dropped(batch.kind);
                ctx.pending.fetch_sub(1, Ordering::SeqCst);
            }
            WorkRequest::Shutdown { response } => acks.push(response),
        }
    }

    for ack in acks {
        let _ = ack.send(());
    }
    tracing::debug!(worker_id, "Fan-out worker stopped");
}

/// Drives one job through its state machine until it is terminal.
async fn run_job<K: FeedSink, N: Notifier>(
    worker_id: usize,
    job: FanoutJob,
    ctx: &WorkerContext<K, N>,
) -> JobReport {
    let mut run = JobRun::new(job);

    loop {
        run.enqueue();
        run.start();
        let outcome = match tokio::time::timeout(ctx.job_timeout, execute(&job, ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FanoutError::Retryable(format!(
                "attempt timed out after {}ms",
                ctx.job_timeout.as_millis()
            ))),
        };

        if run.finish(outcome, ctx.max_attempts) != JobState::RetryableFailure {
            break;
        }

        let delay = ctx.backoff.delay(run.attempts());
        tracing::warn!(
            worker_id,
            content_id = %job.content_id,
            follower_id = %job.target_follower_id,
            kind = %job.kind,
            attempts = run.attempts(),
            error = ?run.last_error(),
            retry_in_ms = delay.as_millis() as u64,
            "Fan-out job failed; retrying"
        );
        telemetry::record_job_retry(job.kind);

        tokio::select! {
            biased;
            () = ctx.shutdown_token.cancelled() => {
                run.abandon();
                break;
            }
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug_assert!(run.state().is_terminal());
    let report = run.into_report();
    log_outcome(worker_id, &report);
    ctx.subscribers.publish(&report);
    report
}

async fn execute<K: FeedSink, N: Notifier>(
    job: &FanoutJob,
    ctx: &WorkerContext<K, N>,
) -> Result<(), FanoutError> {
    match job.kind {
        JobKind::FeedInsert => {
            let inserted = ctx
                .sink
                .insert_feed_entry(job.target_follower_id, job.content_id)
                .await?;
            if !inserted {
                tracing::trace!(
                    content_id = %job.content_id,
                    follower_id = %job.target_follower_id,
                    "Feed entry already present"
                );
            }
        }
        JobKind::PushNotify => ctx.notifier.notify(&PushNotification::from(job)).await?,
    }
    Ok(())
}

fn log_outcome(worker_id: usize, report: &JobReport) {
    let job = &report.job;
    match &report.error {
        None => {
            tracing::debug!(
                worker_id,
                content_id = %job.content_id,
                follower_id = %job.target_follower_id,
                kind = %job.kind,
                attempts = report.attempts,
                "Fan-out job succeeded"
            );
            telemetry::record_job_succeeded(job.kind);
        }
        Some(error) => {
            tracing::error!(
                worker_id,
                content_id = %job.content_id,
                follower_id = %job.target_follower_id,
                kind = %job.kind,
                attempts = report.attempts,
                error = %error,
                "Fan-out job failed permanently"
            );
            telemetry::record_job_failed(job.kind);
        }
    }
}
