//! Cooperative cancellation
//!
//! Every sleep in the monitor (operating-window wait, retry backoff,
//! inter-page delay, inter-cycle wait) goes through a [`StopToken`] so a
//! stop request is honored within bounded latency instead of only at the
//! top of the loop.

use std::time::Duration;
use tokio::sync::watch;

/// Sender half held by whoever may request a stop
pub type StopSignal = watch::Sender<bool>;

/// Receiver half checked at every suspension point
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// Creates a signal/token pair
    pub fn new_pair() -> (StopSignal, StopToken) {
        let (tx, rx) = watch::channel(false);
        (tx, StopToken { rx })
    }

    /// Creates a token that can never be stopped (tests, one-shot runs)
    pub fn never() -> StopToken {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive forever so changed() never resolves
        std::mem::forget(tx);
        StopToken { rx }
    }

    /// Whether a stop has been requested
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleeps for `duration` unless a stop arrives first
    ///
    /// Returns `true` if the full duration elapsed, `false` on stop. A
    /// dropped sender counts as a stop.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            changed = self.rx.changed() => match changed {
                Ok(()) => !*self.rx.borrow(),
                Err(_) => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sleep_completes_without_stop() {
        let (_tx, mut token) = StopToken::new_pair();
        assert!(token.sleep(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_stop_interrupts_sleep() {
        let (tx, mut token) = StopToken::new_pair();

        let start = Instant::now();
        let sleeper = tokio::spawn(async move { token.sleep(Duration::from_secs(60)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        assert!(!sleeper.await.unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_stop() {
        let (tx, mut token) = StopToken::new_pair();
        drop(tx);
        assert!(!token.sleep(Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_never_token_sleeps_through() {
        let mut token = StopToken::never();
        assert!(token.sleep(Duration::from_millis(5)).await);
        assert!(!token.is_stopped());
    }
}
