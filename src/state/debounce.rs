//! Cancel-and-replace debouncer for the remote save path.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Schedules at most one pending invocation; scheduling again resets the
/// timer instead of queueing a second run.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Create an idle debouncer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` after `delay`, cancelling any previously scheduled run.
    pub fn schedule<F, Fut>(&self, delay: Duration, work: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            sleep(delay).await;
            work().await;
        });

        let mut slot = self.pending.lock().expect("debouncer poisoned");
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Whether nothing is scheduled (or the last run already fired).
    pub fn is_idle(&self) -> bool {
        self.pending
            .lock()
            .expect("debouncer poisoned")
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    /// Drop any pending invocation without running it.
    pub fn cancel(&self) {
        if let Some(task) = self
            .pending
            .lock()
            .expect("debouncer poisoned")
            .take()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn rapid_schedules_collapse_to_the_last_one() {
        let debouncer = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let runs = runs.clone();
            debouncer.schedule(Duration::from_millis(50), move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_drops_the_pending_run() {
        let debouncer = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        debouncer.schedule(Duration::from_millis(50), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
