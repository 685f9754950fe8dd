use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Latest progress reported by a running task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    /// Completion in [0.0, 100.0], or `None` when indeterminate.
    pub percent: Option<f64>,
    pub message: String,
}

/// Handed to each task body for reporting progress.
///
/// Reports overwrite each other; a slow reader only sees the latest one.
pub struct ProgressSender {
    tx: watch::Sender<ProgressUpdate>,
}

impl ProgressSender {
    pub fn report(&self, percent: Option<f64>, message: &str) {
        let _ = self.tx.send(ProgressUpdate {
            percent,
            message: message.to_string(),
        });
    }
}

/// Handle to a spawned background task.
pub struct TaskHandle {
    pub id: u64,
    pub title: String,
    /// Observe the latest [`ProgressUpdate`] without consuming it.
    pub progress: watch::Receiver<ProgressUpdate>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Wait for the task to finish, complete or cancelled.
    pub async fn wait(self) {
        let _ = self.join.await;
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Spawns background work with a hard cap on how many tasks run at once.
///
/// The permit is acquired inside the spawned task, so `spawn` itself never
/// blocks; excess tasks queue on the semaphore in spawn order.
pub struct TaskRunner {
    semaphore: Arc<Semaphore>,
    next_id: AtomicU64,
}

impl TaskRunner {
    /// A `max_concurrency` of zero is treated as one.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            next_id: AtomicU64::new(1),
        }
    }

    /// Spawn `work`, which receives a [`ProgressSender`] for status updates.
    ///
    /// Cancelling the token before a permit is available skips the work
    /// entirely; cancelling while the work runs abandons it at the next
    /// await point.
    pub fn spawn<F, Fut>(
        &self,
        title: impl Into<String>,
        cancel: &CancellationToken,
        work: F,
    ) -> TaskHandle
    where
        F: FnOnce(ProgressSender) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let title = title.into();
        let (progress_tx, progress_rx) = watch::channel(ProgressUpdate::default());

        let semaphore = Arc::clone(&self.semaphore);
        let cancel = cancel.clone();
        let task_title = title.clone();

        let join = tokio::spawn(async move {
            let _permit = tokio::select! {
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // The semaphore is never closed; treat it like cancellation.
                    Err(_) => return,
                },
                _ = cancel.cancelled() => {
                    debug!(task_id = id, title = %task_title, "task cancelled while queued");
                    return;
                }
            };

            debug!(task_id = id, title = %task_title, "task started");
            tokio::select! {
                _ = work(ProgressSender { tx: progress_tx }) => {
                    debug!(task_id = id, title = %task_title, "task finished");
                }
                _ = cancel.cancelled() => {
                    debug!(task_id = id, title = %task_title, "task cancelled");
                }
            }
        });

        TaskHandle {
            id,
            title,
            progress: progress_rx,
            join,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct ConcurrencyProbe {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }

        async fn run_for(&self, duration: Duration) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(duration).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_runner_never_overlaps_tasks() {
        let runner = TaskRunner::new(1);
        let cancel = CancellationToken::new();
        let probe = ConcurrencyProbe::new();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let probe = Arc::clone(&probe);
            handles.push(runner.spawn("probe", &cancel, move |_progress| async move {
                probe.run_for(Duration::from_millis(50)).await;
            }));
        }
        for handle in handles {
            handle.wait().await;
        }

        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_capped_at_limit() {
        let runner = TaskRunner::new(2);
        let cancel = CancellationToken::new();
        let probe = ConcurrencyProbe::new();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let probe = Arc::clone(&probe);
            handles.push(runner.spawn("probe", &cancel, move |_progress| async move {
                probe.run_for(Duration::from_millis(50)).await;
            }));
        }
        for handle in handles {
            handle.wait().await;
        }

        assert_eq!(probe.peak.load(Ordering::SeqCst), 2);
        assert_eq!(probe.running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_concurrency_clamps_to_one() {
        let runner = TaskRunner::new(0);
        let cancel = CancellationToken::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        runner
            .spawn("clamped", &cancel, move |_progress| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .wait()
            .await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_updates_reach_the_handle() {
        let runner = TaskRunner::new(1);
        let cancel = CancellationToken::new();

        let mut handle = runner.spawn("indexing", &cancel, |progress| async move {
            progress.report(Some(50.0), "halfway");
            progress.report(Some(100.0), "done");
        });

        assert_eq!(handle.title, "indexing");
        // The sender is dropped when the task body returns; drain what it sent.
        while handle.progress.changed().await.is_ok() {}
        let last = handle.progress.borrow().clone();
        assert_eq!(last.percent, Some(100.0));
        assert_eq!(last.message, "done");
        handle.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start_skips_work() {
        let runner = TaskRunner::new(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        runner
            .spawn("skipped", &cancel, move |_progress| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .wait()
            .await;

        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_running_work() {
        let runner = TaskRunner::new(1);
        let cancel = CancellationToken::new();

        let handle = runner.spawn("stuck", &cancel, |_progress| async {
            std::future::pending::<()>().await;
        });

        cancel.cancel();
        handle.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_task_runs_after_first_completes() {
        let runner = TaskRunner::new(1);
        let cancel = CancellationToken::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first_log = Arc::clone(&order);
        let first = runner.spawn("first", &cancel, move |_progress| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            first_log.lock().unwrap().push("first");
        });
        let second_log = Arc::clone(&order);
        let second = runner.spawn("second", &cancel, move |_progress| async move {
            second_log.lock().unwrap().push("second");
        });

        first.wait().await;
        second.wait().await;

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_ids_are_distinct() {
        let runner = TaskRunner::new(2);
        let cancel = CancellationToken::new();

        let a = runner.spawn("a", &cancel, |_progress| async {});
        let b = runner.spawn("b", &cancel, |_progress| async {});

        assert_ne!(a.id, b.id);
        a.wait().await;
        b.wait().await;
    }
}
