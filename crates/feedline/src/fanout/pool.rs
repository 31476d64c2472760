use super::FanoutBatch;
use core::time::Duration;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// How long to wait for each worker to accept and acknowledge a shutdown
/// signal once the token has been cancelled.
const WORKER_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Poll interval while waiting for the queues to drain.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Messages understood by a fan-out worker.
#[derive(Debug)]
pub(crate) enum WorkRequest {
    Fanout(FanoutBatch),
    Shutdown { response: oneshot::Sender<()> },
}

/// Round-robin router over a fixed set of bounded worker queues.
///
/// Submission never awaits: a full queue is skipped, and when every queue is
/// full the batch is handed back to the caller to shed. Shutdown is phased:
/// stop accepting, drain, cancel, then signal and await each worker.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    workers: Vec<mpsc::Sender<WorkRequest>>,
    next_worker: AtomicUsize,
    accepting: AtomicBool,
    /// Batches accepted but not yet finished (or dropped) by a worker.
    pending: Arc<AtomicUsize>,
    shutdown_token: CancellationToken,
}

impl WorkerPool {
    pub(crate) fn new(
        workers: Vec<mpsc::Sender<WorkRequest>>,
        pending: Arc<AtomicUsize>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            workers,
            next_worker: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            pending,
            shutdown_token,
        }
    }

    /// Computes the next worker index using relaxed atomic round-robin logic.
    fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Queues `batch` on the next worker with room for it.
    ///
    /// Starts at the round-robin worker and probes every other worker once.
    /// Returns the batch back if the pool is shutting down or every queue is
    /// full.
    pub(crate) fn try_submit(&self, batch: FanoutBatch) -> Result<(), FanoutBatch> {
        // Count first so a concurrent drain cannot miss this batch.
        self.pending.fetch_add(1, Ordering::SeqCst);
        if !self.is_accepting() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(batch);
        }

        let start = self.next_worker_index();
        let len = self.workers.len();
        for offset in 0..len {
            if let Ok(permit) = self.workers[(start + offset) % len].try_reserve() {
                permit.send(WorkRequest::Fanout(batch));
                return Ok(());
            }
        }

        self.pending.fetch_sub(1, Ordering::SeqCst);
        Err(batch)
    }

    /// Stops intake, drains, then stops every worker.
    ///
    /// - Rejects further submissions.
    /// - Waits up to `drain_timeout` for accepted batches to finish.
    /// - Cancels the shared [`CancellationToken`]; workers drop and log
    ///   whatever is still queued.
    /// - Sends a [`WorkRequest::Shutdown`] to each worker and waits up to 3
    ///   seconds per worker for confirmation.
    ///
    /// Calling this more than once is a no-op.
    pub(crate) async fn shutdown(&self, drain_timeout: Duration) {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!(
            pending = self.pending(),
            "Fan-out intake stopped; draining queued batches"
        );

        let drained = tokio::time::timeout(drain_timeout, async {
            while self.pending() > 0 {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await
        .is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.pending(),
                timeout_ms = drain_timeout.as_millis() as u64,
                "Fan-out drain timed out; remaining batches will be dropped"
            );
        }

        self.shutdown_token.cancel();
        let mut shutdown_handles = Vec::with_capacity(self.workers.len());

        for (i, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            match tokio::time::timeout(
                WORKER_ACK_TIMEOUT,
                worker.send(WorkRequest::Shutdown { response: tx }),
            )
            .await
            {
                Ok(Ok(())) => shutdown_handles.push((i, rx)),
                // The worker already observed the token and closed its queue
                Ok(Err(_)) => tracing::debug!(worker_id = i, "Fan-out worker already stopped"),
                Err(_) => tracing::warn!(worker_id = i, "Timed out signalling fan-out worker"),
            }
        }

        for (i, handle) in shutdown_handles {
            match tokio::time::timeout(WORKER_ACK_TIMEOUT, handle).await {
                Ok(Ok(())) => tracing::debug!(worker_id = i, "Fan-out worker shut down gracefully"),
                Ok(Err(e)) => tracing::debug!(worker_id = i, "Fan-out worker shutdown response: {e}"),
                Err(_) => tracing::warn!(worker_id = i, "Fan-out worker shutdown timeout"),
            }
        }

        tracing::info!("Fan-out pool shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fanout::JobKind,
        types::{ContentId, UserId},
    };

    fn batch(n: u64) -> FanoutBatch {
        FanoutBatch {
            content_id: ContentId(n),
            author_id: UserId(1),
            kind: JobKind::FeedInsert,
            followers: vec![UserId(2)],
        }
    }

    #[test]
    fn full_queues_hand_the_batch_back() {
        let (tx_a, mut rx_a) = mpsc::channel(1);
        let (tx_b, mut rx_b) = mpsc::channel(1);
        let pending = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(vec![tx_a, tx_b], Arc::clone(&pending), CancellationToken::new());

        assert!(pool.try_submit(batch(1)).is_ok());
        assert!(pool.try_submit(batch(2)).is_ok());
        assert_eq!(pool.try_submit(batch(3)), Err(batch(3)));
        assert_eq!(pending.load(Ordering::SeqCst), 2);

        assert!(matches!(rx_a.try_recv(), Ok(WorkRequest::Fanout(b)) if b == batch(1)));
        assert!(matches!(rx_b.try_recv(), Ok(WorkRequest::Fanout(b)) if b == batch(2)));
    }

    #[test]
    fn probes_past_a_full_worker() {
        let (tx_a, _rx_a) = mpsc::channel(1);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let pool = WorkerPool::new(
            vec![tx_a, tx_b],
            Arc::new(AtomicUsize::new(0)),
            CancellationToken::new(),
        );

        for n in 0..4 {
            assert!(pool.try_submit(batch(n)).is_ok(), "batch {n}");
        }
        let mut on_b = 0;
        while rx_b.try_recv().is_ok() {
            on_b += 1;
        }
        assert_eq!(on_b, 3);
    }

    #[tokio::test]
    async fn rejects_after_shutdown_begins() {
        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let pool = WorkerPool::new(vec![tx], Arc::new(AtomicUsize::new(0)), token.clone());

        drop(rx);
        pool.shutdown(Duration::from_millis(10)).await;

        assert!(token.is_cancelled());
        assert!(!pool.is_accepting());
        assert!(pool.try_submit(batch(1)).is_err());
        assert_eq!(pool.pending(), 0);
    }
}
