//! Drain-to-quiescence barrier over the background job scheduler.

use boardcheck_core::ports::JobScheduler;
use boardcheck_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Blocks until the scheduler reports no outstanding work of any kind.
///
/// The wait is global, not scoped to the caller's own jobs; it is only
/// meaningful while nothing else submits unrelated work.
#[derive(Clone)]
pub struct QuiescenceBarrier {
    scheduler: Arc<dyn JobScheduler>,
    timeout: Option<Duration>,
}

impl QuiescenceBarrier {
    /// A barrier that gives up after `timeout`, or waits forever with `None`.
    pub fn new(scheduler: Arc<dyn JobScheduler>, timeout: Option<Duration>) -> Self {
        Self { scheduler, timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn drain(&self) -> Result<()> {
        let pending = self.scheduler.pending();
        if pending > 0 {
            debug!(pending, "Waiting for background jobs to finish");
        }

        match self.timeout {
            Some(limit) => timeout(limit, self.scheduler.wait_until_idle())
                .await
                .map_err(|_| {
                    warn!(
                        pending = self.scheduler.pending(),
                        timeout_secs = limit.as_secs(),
                        "Background jobs did not drain"
                    );
                    Error::BarrierTimeout {
                        secs: limit.as_secs(),
                    }
                }),
            None => {
                self.scheduler.wait_until_idle().await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobTracker;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    #[tokio::test]
    async fn test_drain_returns_once_idle() {
        let jobs = JobTracker::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        jobs.spawn("gate", async move {
            let _ = rx.await;
            Ok(())
        });

        let barrier = QuiescenceBarrier::new(Arc::new(jobs.clone()), None);
        let waiter = tokio::spawn(async move { barrier.drain().await });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        tx.send(()).unwrap();
        waiter.await.unwrap().unwrap();
        assert_eq!(jobs.pending(), 0);
    }

    #[tokio::test]
    async fn test_drain_pending_until_last_job_ends() {
        let jobs = JobTracker::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = jobs.spawn("gate", async move {
            let _ = rx.await;
            Ok(())
        });

        let barrier = QuiescenceBarrier::new(Arc::new(jobs.clone()), None);
        let mut drain = task::spawn(barrier.drain());
        assert_pending!(drain.poll());

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(drain.is_woken());
        assert_ready_ok!(drain.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_times_out_on_stalled_scheduler() {
        let jobs = JobTracker::new();
        jobs.spawn("stalled", std::future::pending());

        let barrier = QuiescenceBarrier::new(Arc::new(jobs), Some(Duration::from_secs(5)));
        let err = barrier.drain().await.unwrap_err();
        assert!(matches!(err, Error::BarrierTimeout { secs: 5 }));
    }
}
