//! In-process background job tracking.

use async_trait::async_trait;
use boardcheck_core::Result;
use boardcheck_core::ports::JobScheduler;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Counts spawned background jobs so callers can wait for all of them.
#[derive(Clone, Default)]
pub struct JobTracker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    pending: AtomicUsize,
    idle: Notify,
}

/// Decrements the pending count when a job ends, however it ends.
struct JobGuard {
    inner: Arc<Inner>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a tracked job on the current runtime. Failures are logged, not
    /// propagated.
    pub fn spawn<F>(&self, name: impl Into<String>, job: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        let guard = JobGuard {
            inner: self.inner.clone(),
        };

        tokio::spawn(async move {
            let _guard = guard;
            debug!(job = %name, "Background job started");
            match job.await {
                Ok(()) => debug!(job = %name, "Background job finished"),
                Err(e) => warn!(job = %name, error = %e, "Background job failed"),
            }
        })
    }
}

#[async_trait]
impl JobScheduler for JobTracker {
    fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    async fn wait_until_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a wake-up between the check and the
            // await is not lost.
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcheck_core::Error;
    use std::time::Duration;

    #[tokio::test]
    async fn test_idle_when_nothing_spawned() {
        let jobs = JobTracker::new();
        assert_eq!(jobs.pending(), 0);
        jobs.wait_until_idle().await;
    }

    #[tokio::test]
    async fn test_waits_for_all_jobs() {
        let jobs = JobTracker::new();
        for i in 0..5u64 {
            jobs.spawn(format!("job-{}", i), async move {
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                Ok(())
            });
        }
        assert_eq!(jobs.pending(), 5);
        jobs.wait_until_idle().await;
        assert_eq!(jobs.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_job_still_counts_as_done() {
        let jobs = JobTracker::new();
        let handle = jobs.spawn("broken", async { Err(Error::Internal("nope".into())) });
        handle.await.unwrap();
        assert_eq!(jobs.pending(), 0);
    }

    #[tokio::test]
    async fn test_jobs_spawned_by_jobs_are_awaited() {
        let jobs = JobTracker::new();
        let inner = jobs.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();
        jobs.spawn("parent", async move {
            inner.spawn("child", async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = tx.send(());
                Ok(())
            });
            Ok(())
        });
        jobs.wait_until_idle().await;
        assert!(rx.await.is_ok());
    }
}
