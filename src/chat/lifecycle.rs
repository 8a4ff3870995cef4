//! Teardown and deadline helpers shared by the processor and the coordinator.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use crate::{Error, Result};

#[derive(Debug, Default)]
struct Teardown {
    torn_down: AtomicBool,
    notify: Notify,
}

/// Shared flag that marks a chat session as torn down.
///
/// Clones share state. Once torn down, in-flight network operations awaited
/// through [`run_unless_torn_down`](Self::run_unless_torn_down) resolve to
/// [`Error::Abort`] and their results are discarded without touching the
/// display.
#[derive(Debug, Clone, Default)]
pub struct TeardownHandle {
    inner: Arc<Teardown>,
}

impl TeardownHandle {
    /// Creates a handle that is not torn down.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the session torn down and wakes every pending operation.
    pub fn tear_down(&self) {
        self.inner.torn_down.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns true once [`tear_down`](Self::tear_down) has been called.
    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    /// Resolves once the session is torn down.
    pub async fn torn_down(&self) {
        loop {
            // Register before checking so a concurrent tear_down is not missed.
            let notified = self.inner.notify.notified();
            if self.is_torn_down() {
                return;
            }
            notified.await;
        }
    }

    /// Awaits `fut` unless the session is, or becomes, torn down.
    pub async fn run_unless_torn_down<F: Future>(&self, fut: F) -> Result<F::Output> {
        if self.is_torn_down() {
            return Err(torn_down_error());
        }
        tokio::select! {
            biased;
            _ = self.torn_down() => Err(torn_down_error()),
            output = fut => {
                if self.is_torn_down() {
                    Err(torn_down_error())
                } else {
                    Ok(output)
                }
            }
        }
    }
}

fn torn_down_error() -> Error {
    Error::abort("chat session torn down")
}

/// Awaits `fut` for at most `duration`, mapping expiry to a timeout error.
pub(crate) async fn with_deadline<T, F>(duration: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(
            format!("{what} took longer than {}s", duration.as_secs_f64()),
            Some(duration.as_secs_f64()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_when_not_torn_down() {
        let teardown = TeardownHandle::new();
        assert_eq!(teardown.run_unless_torn_down(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn already_torn_down_skips_work() {
        let teardown = TeardownHandle::new();
        teardown.clone().tear_down();
        assert!(teardown.is_torn_down());
        let err = teardown.run_unless_torn_down(async { 7 }).await.unwrap_err();
        assert!(err.is_abort());
        assert_eq!(err.to_string(), "Request aborted: chat session torn down");
    }

    #[tokio::test]
    async fn tear_down_interrupts_pending_work() {
        let teardown = TeardownHandle::new();
        let remote = teardown.clone();
        let pending = tokio::spawn(async move {
            teardown
                .run_unless_torn_down(futures::future::pending::<()>())
                .await
        });
        tokio::task::yield_now().await;
        remote.tear_down();
        assert!(pending.await.unwrap().unwrap_err().is_abort());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let result: Result<()> = with_deadline(
            Duration::from_secs(5),
            "history fetch",
            futures::future::pending(),
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("history fetch took longer than 5s"));
    }

    #[tokio::test]
    async fn deadline_passes_results_through() {
        let result = with_deadline(Duration::from_secs(5), "send", async { Ok(3) }).await;
        assert_eq!(result.unwrap(), 3);
    }
}
