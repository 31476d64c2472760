use super::{
    Backoff, DispatcherConfig, FanoutBatch, JobKind, JobReport,
    pool::WorkerPool,
    worker::{Subscribers, WorkerContext, worker_loop},
};
use crate::{
    error::{Error, Result},
    store::{FeedSink, Notifier},
    telemetry,
    types::{ContentId, UserId},
};
use std::sync::{Arc, atomic::AtomicUsize};
use tokio::{runtime::Handle, sync::mpsc};
use tokio_util::sync::CancellationToken;

/// What a call to [`Dispatcher::dispatch`] managed to queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub batches_enqueued: usize,
    /// Batches rejected because every queue was full or shutdown had begun.
    pub batches_shed: usize,
    pub jobs_enqueued: usize,
}

/// Non-blocking hand-off of follower propagation to a fixed worker pool.
///
/// [`dispatch`](Self::dispatch) only enqueues; the write path returns to its
/// caller without waiting for a single feed insert or notification. Job
/// outcomes are visible through logs and [`subscribe`](Self::subscribe),
/// never through the original request.
#[derive(Debug)]
pub struct Dispatcher {
    config: DispatcherConfig,
    pool: WorkerPool,
    subscribers: Arc<Subscribers>,
}

impl Dispatcher {
    /// Validates `config` and spawns `config.num_workers` workers on the
    /// current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` is unusable or no Tokio
    /// runtime is running.
    pub fn new<K: FeedSink, N: Notifier>(
        config: DispatcherConfig,
        sink: Arc<K>,
        notifier: Arc<N>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| Error::InvalidConfig {
            reason: format!("fan-out workers need a Tokio runtime: {e}"),
        })?;

        let pending = Arc::new(AtomicUsize::new(0));
        let subscribers = Arc::new(Subscribers::default());
        let shutdown_token = CancellationToken::new();
        let ctx = Arc::new(WorkerContext {
            sink,
            notifier,
            max_attempts: config.max_attempts,
            job_timeout: config.job_timeout,
            backoff: Backoff::new(config.backoff_base, config.backoff_max),
            pending: Arc::clone(&pending),
            subscribers: Arc::clone(&subscribers),
            shutdown_token: shutdown_token.clone(),
        });

        let mut workers = Vec::with_capacity(config.num_workers);
        for worker_id in 0..config.num_workers {
            let (tx, rx) = mpsc::channel(config.queue_capacity);
            runtime.spawn(worker_loop(worker_id, rx, Arc::clone(&ctx)));
            workers.push(tx);
        }
        tracing::info!(
            workers = config.num_workers,
            queue_capacity = config.queue_capacity,
            batch_size = config.batch_size,
            max_attempts = config.max_attempts,
            "Fan-out dispatcher started"
        );

        Ok(Self {
            pool: WorkerPool::new(workers, pending, shutdown_token),
            config,
            subscribers,
        })
    }

    /// Enqueues one feed-insert job and one push-notify job per follower.
    ///
    /// Followers are chunked into batches of `batch_size`. This never awaits
    /// and never fails: a batch that finds every queue full, or arrives after
    /// [`shutdown`](Self::shutdown) began, is shed and logged.
    pub fn dispatch(
        &self,
        content_id: ContentId,
        author_id: UserId,
        followers: &[UserId],
    ) -> DispatchReceipt {
        let mut receipt = DispatchReceipt::default();
        let mut jobs_shed = 0;

        for chunk in followers.chunks(self.config.batch_size) {
            for kind in JobKind::ALL {
                let batch = FanoutBatch {
                    content_id,
                    author_id,
                    kind,
                    followers: chunk.to_vec(),
                };
                let jobs = batch.len();
                match self.pool.try_submit(batch) {
                    Ok(()) => {
                        receipt.batches_enqueued += 1;
                        receipt.jobs_enqueued += jobs;
                    }
                    Err(shed) => {
                        receipt.batches_shed += 1;
                        jobs_shed += shed.len();
                        telemetry::record_batch_shed(shed.kind);
                    }
                }
            }
        }

        if receipt.batches_shed > 0 {
            tracing::warn!(
                %content_id,
                %author_id,
                batches_shed = receipt.batches_shed,
                jobs_shed,
                accepting = self.pool.is_accepting(),
                "Fan-out queues rejected batches; shedding"
            );
        } else {
            tracing::debug!(
                %content_id,
                %author_id,
                followers = followers.len(),
                batches = receipt.batches_enqueued,
                "Fan-out dispatched"
            );
        }
        receipt
    }

    /// A stream of [`JobReport`]s for every job that reaches a terminal
    /// state after this call.
    ///
    /// The stream holds at most [`REPORT_BUFFER`](super::REPORT_BUFFER)
    /// unread reports; while it is full, newer reports are dropped for this
    /// subscriber only.
    pub fn subscribe(&self) -> mpsc::Receiver<JobReport> {
        self.subscribers.subscribe()
    }

    /// Batches accepted but not yet finished or dropped.
    pub fn pending_batches(&self) -> usize {
        self.pool.pending()
    }

    /// Stops intake, drains for up to `drain_timeout`, then stops the
    /// workers. Batches still queued after the drain are dropped and logged.
    pub async fn shutdown(&self) {
        self.pool.shutdown(self.config.drain_timeout).await;
    }
}
