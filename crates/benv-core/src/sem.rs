//! Bounded-concurrency tokens.
//!
//! A [`Semaphore`] is a cloneable capability that wraps an async action and
//! limits how many wrapped actions run at once. The unbounded variant is an
//! identity wrapper, so call sites never branch on whether a limit is set.

use std::future::Future;
use std::sync::Arc;

/// Abstract concurrency limiter shared between tasks.
///
/// `none()` imposes no limit; `bounded(n)` allows at most `n` concurrent
/// holders, served in FIFO order. Dropping a holder mid-action (task
/// cancellation) releases its token.
#[derive(Debug, Clone, Default)]
pub struct Semaphore {
    inner: Option<Arc<tokio::sync::Semaphore>>,
}

impl Semaphore {
    /// A semaphore that never blocks.
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// A semaphore with `n` tokens. `n = 0` is an alias for unbounded.
    pub fn bounded(n: usize) -> Self {
        if n == 0 {
            return Self::none();
        }
        Self {
            inner: Some(Arc::new(tokio::sync::Semaphore::new(n))),
        }
    }

    /// Whether this semaphore actually limits concurrency.
    pub fn is_bounded(&self) -> bool {
        self.inner.is_some()
    }

    /// Run `action` while holding a token.
    pub async fn with_token<T>(&self, action: impl Future<Output = T>) -> T {
        match &self.inner {
            None => action.await,
            Some(sem) => {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = sem.acquire().await.expect("semaphore closed");
                action.await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Run `tasks` concurrent holders and return the peak concurrency seen
    /// inside the token-guarded section.
    async fn peak_concurrency(sem: Semaphore, tasks: usize) -> usize {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..tasks {
            let sem = sem.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                sem.with_token(async {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        peak.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_bounded_limits_concurrency() {
        let peak = peak_concurrency(Semaphore::bounded(3), 16).await;
        assert!(peak <= 3, "peak concurrency {} exceeded bound", peak);
    }

    #[tokio::test]
    async fn test_none_is_identity() {
        let sem = Semaphore::none();
        assert!(!sem.is_bounded());
        assert_eq!(sem.with_token(async { 42 }).await, 42);
    }

    #[tokio::test]
    async fn test_bounded_zero_is_unbounded() {
        assert!(!Semaphore::bounded(0).is_bounded());
        assert!(Semaphore::bounded(1).is_bounded());
    }

    #[tokio::test]
    async fn test_cancelled_holder_releases_token() {
        let sem = Semaphore::bounded(1);

        let held = sem.clone();
        let handle = tokio::spawn(async move {
            held.with_token(std::future::pending::<()>()).await;
        });

        // Let the task acquire the only token, then cancel it.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        handle.abort();
        let _ = handle.await;

        // The token must be available again.
        let ran = sem.with_token(async { true }).await;
        assert!(ran);
    }
}
