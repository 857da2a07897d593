//! Async runtime utilities.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// A cloneable, level-triggered cancellation flag.
///
/// Once cancelled it stays cancelled; every clone observes the same state.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Create a new, not-yet-cancelled signal.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Trip the signal for every holder.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether the signal has been tripped.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once the signal is tripped.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns once tripped.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a future with a timeout.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError)
}

/// Timeout error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("operation timed out")]
pub struct TimeoutError;

/// Run multiple futures concurrently, returning when all complete.
pub async fn join_all<I, F, T>(futures: I) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    futures::future::join_all(futures).await
}

/// Sleep for a duration.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await
}

/// Sleep for `duration` unless `signal` trips first.
///
/// Returns `true` when the full duration elapsed, `false` when cancelled.
/// A zero duration returns immediately without yielding.
pub async fn sleep_or_cancel(duration: Duration, signal: Option<&CancelSignal>) -> bool {
    if let Some(signal) = signal {
        if signal.is_cancelled() {
            return false;
        }
    }

    if duration.is_zero() {
        return true;
    }

    match signal {
        Some(signal) => tokio::select! {
            _ = sleep(duration) => true,
            _ = signal.cancelled() => false,
        },
        None => {
            sleep(duration).await;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_failure() {
        let result = with_timeout(Duration::from_millis(10), async {
            sleep(Duration::from_secs(1)).await;
            42
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_join_all() {
        let futures: Vec<_> = (1..=3).map(|i| async move { i }).collect();
        let results = join_all(futures).await;
        assert_eq!(results, vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_signal_is_shared_between_clones() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());

        signal.cancel();
        assert!(clone.is_cancelled());

        // Cancelling twice is harmless.
        clone.cancel();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let signal = CancelSignal::new();

        tokio::spawn({
            let signal = signal.clone();
            async move {
                sleep(Duration::from_millis(10)).await;
                signal.cancel();
            }
        });

        with_timeout(Duration::from_secs(5), signal.cancelled())
            .await
            .expect("cancelled() should resolve");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_or_cancel_without_signal_sleeps_fully() {
        let start = Instant::now();
        assert!(sleep_or_cancel(Duration::from_secs(3), None).await);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_or_cancel_interrupted() {
        let signal = CancelSignal::new();
        tokio::spawn({
            let signal = signal.clone();
            async move {
                sleep(Duration::from_secs(1)).await;
                signal.cancel();
            }
        });

        let start = Instant::now();
        assert!(!sleep_or_cancel(Duration::from_secs(60), Some(&signal)).await);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_already_cancelled() {
        let signal = CancelSignal::new();
        signal.cancel();
        assert!(!sleep_or_cancel(Duration::ZERO, Some(&signal)).await);
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_zero_duration() {
        let signal = CancelSignal::new();
        assert!(sleep_or_cancel(Duration::ZERO, Some(&signal)).await);
    }
}
