//! Outbound notification: the delivery seam and the result batcher

mod batcher;
mod telegram;

use async_trait::async_trait;
use thiserror::Error;

pub use batcher::{pack_results, random_marker, Chunk};
pub use telegram::{TelegramNotifier, TELEGRAM_MAX_MESSAGE_CHARS};

/// Errors from the delivery transport
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Message too long: {len} chars (limit {max})")]
    TooLong { len: usize, max: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Delivery seam consumed by the monitor
///
/// Implementations document a maximum text length per call; the batcher
/// keeps chunks under it.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one message to the recipient
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError>;
}
