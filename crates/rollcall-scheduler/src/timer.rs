//! One-shot timer abstraction used by the escalation engine.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::AbortHandle;

/// Cancellation handle for a scheduled callback. Dropping the handle does
/// not cancel the timer; call [`TimerHandle::cancel`].
#[derive(Debug, Default)]
pub struct TimerHandle {
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    /// A handle that controls nothing.
    pub fn detached() -> Self {
        Self { abort: None }
    }

    pub fn cancel(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.abort.as_ref().is_none_or(|a| a.is_finished())
    }
}

/// Runs a future once after a delay.
pub trait Timers: Send + Sync {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle;
}

/// Timers backed by `tokio::time::sleep` on spawned tasks.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimers;

impl Timers for TokioTimers {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle {
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        TimerHandle::new(join.abort_handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _handle = TokioTimers.schedule(
            Duration::from_secs(300),
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let handle = TokioTimers.schedule(
            Duration::from_secs(60),
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(handle.is_finished());
    }
}
