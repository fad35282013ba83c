//! Telegram delivery transport
//!
//! Implements the [`Notifier`] seam over the Bot API `sendMessage` call.
//! Messages are capped at 4096 characters by the API; the batcher keeps
//! chunks under that limit, and this client rejects oversize text outright
//! rather than letting the API truncate silently.

use crate::notify::{Notifier, NotifyError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Telegram Bot API message-length limit
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Notifier over the Telegram Bot API
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramNotifier {
    /// Creates a notifier for the given bot token
    pub fn new(token: &str) -> Result<Self, reqwest::Error> {
        Self::with_api_base(token, "https://api.telegram.org")
    }

    /// Creates a notifier against a custom API base URL (used by tests)
    pub fn with_api_base(token: &str, api_base: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        if text.chars().count() > TELEGRAM_MAX_MESSAGE_CHARS {
            return Err(NotifyError::TooLong {
                len: text.chars().count(),
                max: TELEGRAM_MAX_MESSAGE_CHARS,
            });
        }

        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let body = SendMessageBody {
            chat_id: recipient,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(NotifyError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(())
    }
}
