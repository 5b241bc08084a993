//! Cache writes that run behind the response.
//!
//! A fetch handler hands its response back as soon as the network answers;
//! the copy into the store is spawned here and awaited by its own task so
//! failures still reach the log. `settle` waits for everything in flight.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;

#[derive(Debug, Default)]
pub struct PendingWrites {
    tasks: Mutex<JoinSet<()>>,
}

impl PendingWrites {
    /// Spawn a write. Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, write: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        // reap finished writes
        while tasks.try_join_next().is_some() {}
        tasks.spawn(write);
    }

    /// Wait until every spawned write, including ones spawned while
    /// waiting, has finished.
    pub async fn settle(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                return;
            }
            while let Some(result) = batch.join_next().await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "cache write task failed");
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_settle_waits_for_writes() {
        let writes = PendingWrites::default();
        let done = Arc::new(AtomicUsize::new(0));

        for delay in [30, 10, 20] {
            let done = Arc::clone(&done);
            writes.spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        writes.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert!(writes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_settle_survives_panicking_write() {
        let writes = PendingWrites::default();
        writes.spawn(async { panic!("boom") });
        writes.settle().await;
        assert!(writes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_settle_with_nothing_pending() {
        PendingWrites::default().settle().await;
    }
}
