//! Adaptive cycle interval
//!
//! Sustained empty pages slow polling down: once the consecutive-empty-page
//! counter reaches its threshold the interval is multiplied (up to a hard
//! cap) and the counter restarts. Any yielding page snaps the interval back
//! to base. The counter carries across cycle boundaries and is reset only
//! by yield or restart; it is soft state, never persisted.

use std::time::Duration;

/// Cycle-interval adaptation state
#[derive(Debug)]
pub struct AdaptiveInterval {
    base: Duration,
    cap: Duration,
    multiplier: u32,
    threshold: u32,
    current: Duration,
    consecutive_empty: u32,
}

impl AdaptiveInterval {
    /// Creates the interval at its base value
    pub fn new(base: Duration, cap: Duration, multiplier: u32, threshold: u32) -> Self {
        Self {
            base,
            cap: cap.max(base),
            multiplier: multiplier.max(1),
            threshold: threshold.max(1),
            current: base,
            consecutive_empty: 0,
        }
    }

    /// Records one page outcome
    ///
    /// `yielded` is whether the page produced any qualifying listings.
    pub fn record_page(&mut self, yielded: bool) {
        if yielded {
            self.consecutive_empty = 0;
            if self.current != self.base {
                tracing::info!(
                    "Page yielded results, interval restored to {:?}",
                    self.base
                );
            }
            self.current = self.base;
        } else {
            self.consecutive_empty += 1;
            if self.consecutive_empty >= self.threshold {
                let escalated = self
                    .current
                    .checked_mul(self.multiplier)
                    .unwrap_or(self.cap)
                    .min(self.cap);
                if escalated != self.current {
                    tracing::info!(
                        "{} consecutive empty pages, interval escalated to {:?}",
                        self.consecutive_empty,
                        escalated
                    );
                }
                self.current = escalated;
                self.consecutive_empty = 0;
            }
        }
    }

    /// The current cycle interval
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Consecutive empty pages since the last yield or escalation
    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }
}
