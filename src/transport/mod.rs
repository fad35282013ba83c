//! Session/transport manager
//!
//! Owns the one browser-like session used to fetch pages past bot-detection
//! challenges: TTL-bounded session state, rotating randomized headers,
//! multi-tier retry with widening jittered backoff, and a session-less
//! degraded fallback once the attempt budget is exhausted.

mod client;
mod fetcher;
mod headers;
mod session;

use async_trait::async_trait;
use thiserror::Error;

pub use client::ReqwestFetcher;
pub use fetcher::TransportManager;
pub use headers::{random_headers, RequestHeaders};
pub use session::Session;

/// Typed fetch failure
///
/// The scheduler uses the variant to decide whether to keep retrying at the
/// page level or abandon the page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Anti-bot challenge or block interstitial detected in the body
    #[error("Blocked by anti-bot challenge")]
    Blocked,

    /// Page loaded but the expected content marker is missing
    #[error("Incomplete page (expected content marker missing)")]
    Incomplete,

    /// Connection, timeout, or HTTP-status failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// All attempts and the fallback transport failed
    #[error("Exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    /// A stop request arrived mid-fetch
    #[error("Fetch cancelled by stop request")]
    Cancelled,
}

impl FetchError {
    /// Stable classification string used by the statistics ledger
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Blocked => "blocked",
            FetchError::Incomplete => "incomplete",
            FetchError::Network { .. } => "network",
            FetchError::Exhausted { .. } => "exhausted",
            FetchError::Cancelled => "cancelled",
        }
    }
}

/// Raw response from the page-fetch primitive
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// Set-Cookie header values, one per header
    pub set_cookies: Vec<String>,
}

/// The abstract page-fetch primitive the transport manager drives
///
/// Production uses [`ReqwestFetcher`]; tests script responses.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Issues one request; errors are transport-level (connect, timeout)
    async fn fetch(
        &self,
        url: &str,
        headers: &RequestHeaders,
        cookie: Option<&str>,
    ) -> Result<RawResponse, String>;
}
