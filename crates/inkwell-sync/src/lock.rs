//! Non-reentrant lock for the sync pipeline
//!
//! A flag, not a queue: a caller that finds the lock taken is told so
//! immediately and is expected to skip its run.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Boolean mutex guarding one sync run at a time
#[derive(Debug, Default)]
pub struct SyncLock {
    held: AtomicBool,
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct SyncLockGuard<'a> {
    lock: &'a SyncLock,
}

impl SyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, or `None` if someone else holds it
    pub fn try_acquire(&self) -> Option<SyncLockGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SyncLockGuard { lock: self })
    }

    /// Whether the lock is currently held
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Run `fut` while holding the lock
    ///
    /// Returns `None` without polling `fut` if the lock is already held. The
    /// lock is released when `fut` completes, panics, or is dropped.
    pub async fn with_lock<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        let Some(_guard) = self.try_acquire() else {
            debug!("Sync lock busy");
            return None;
        };
        Some(fut.await)
    }
}

impl Drop for SyncLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::oneshot;
    use tokio_test::{assert_pending, assert_ready};

    #[test]
    fn test_try_acquire_is_exclusive() {
        let lock = SyncLock::new();

        let guard = lock.try_acquire().unwrap();
        assert!(lock.is_held());
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_calls_run_once() {
        let lock = SyncLock::new();
        let runs = AtomicUsize::new(0);
        let (release, wait) = oneshot::channel::<()>();

        let first = lock.with_lock(async {
            runs.fetch_add(1, Ordering::SeqCst);
            wait.await.ok();
            "first"
        });
        let second = async {
            // Let the first call take the lock
            tokio::task::yield_now().await;
            let result = lock
                .with_lock(async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    "second"
                })
                .await;
            release.send(()).ok();
            result
        };

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, Some("first"));
        assert_eq!(b, None);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn test_released_after_error() {
        let lock = SyncLock::new();

        let result: Option<Result<(), &str>> = lock.with_lock(async { Err("boom") }).await;
        assert_eq!(result, Some(Err("boom")));
        assert!(!lock.is_held());
        assert!(lock.with_lock(async { 1 }).await.is_some());
    }

    #[tokio::test]
    async fn test_released_after_panic() {
        let lock = Arc::new(SyncLock::new());

        let task_lock = lock.clone();
        let joined = tokio::spawn(async move {
            task_lock
                .with_lock(async {
                    if std::hint::black_box(true) {
                        panic!("sync blew up");
                    }
                })
                .await
        })
        .await;

        assert!(joined.is_err());
        assert!(!lock.is_held());
    }

    #[test]
    fn test_released_when_future_dropped() {
        let lock = SyncLock::new();

        let mut task = tokio_test::task::spawn(lock.with_lock(std::future::pending::<()>()));
        assert_pending!(task.poll());
        assert!(lock.is_held());

        drop(task);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_busy_lock_does_not_poll_future() {
        let lock = SyncLock::new();
        let _guard = lock.try_acquire().unwrap();
        let polled = AtomicUsize::new(0);

        let mut task = tokio_test::task::spawn(lock.with_lock(async {
            polled.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(assert_ready!(task.poll()), None);
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }
}
