//! Transport manager: retry, session lifecycle, fallback
//!
//! One logical `fetch` spans up to `max_attempts` session-borne attempts
//! with widening jittered backoff, then one session-less fallback attempt
//! with freshly randomized headers. Blocked and incomplete responses force
//! a session reset before the next attempt.

use crate::cancel::StopToken;
use crate::config::TransportConfig;
use crate::transport::headers::random_headers;
use crate::transport::session::Session;
use crate::transport::{FetchError, PageFetcher, RawResponse};
use rand::Rng;
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::time::Duration;

/// How a response body classified against the validity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageValidity {
    Valid,
    Blocked,
    Incomplete,
}

/// Classifies a response body
///
/// Checks, in order: challenge/block markers ("cloudflare" together with
/// "blocked" or "captcha", case-insensitive), then presence of the expected
/// content marker. A page without the marker is a soft failure regardless
/// of size; size only feeds the log line.
fn classify_body(body: &str, content_selector: &str) -> PageValidity {
    let lower = body.to_lowercase();
    if lower.contains("cloudflare") && (lower.contains("blocked") || lower.contains("captcha")) {
        return PageValidity::Blocked;
    }

    let selector = match Selector::parse(content_selector) {
        Ok(s) => s,
        Err(_) => {
            tracing::error!("Invalid content selector: {}", content_selector);
            return PageValidity::Incomplete;
        }
    };

    let document = Html::parse_document(body);
    if document.select(&selector).next().is_some() {
        PageValidity::Valid
    } else {
        PageValidity::Incomplete
    }
}

/// Session-owning transport with multi-tier retry
pub struct TransportManager<F: PageFetcher> {
    fetcher: F,
    config: TransportConfig,
    session: Session,
    session_path: PathBuf,
    session_resets: u32,
}

impl<F: PageFetcher> TransportManager<F> {
    /// Creates the manager, loading any persisted session from `session_path`
    pub fn new(fetcher: F, config: TransportConfig, session_path: PathBuf) -> Self {
        let session = Session::load(&session_path);
        Self {
            fetcher,
            config,
            session,
            session_path,
            session_resets: 0,
        }
    }

    /// Total session resets since this manager was created
    pub fn session_resets(&self) -> u32 {
        self.session_resets
    }

    /// Discards the session and its persisted state, starting fresh
    fn reset_session(&mut self) {
        tracing::info!("Resetting session (reset #{})", self.session_resets + 1);
        self.session = Session::new();
        Session::clear_persisted(&self.session_path);
        self.session_resets += 1;
    }

    /// Randomized backoff; the range widens with each attempt
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let min = self.config.backoff_min_secs;
        let max = self.config.backoff_max_secs.max(min);
        let widened_max = max + u64::from(attempt.saturating_sub(1)) * (max - min);
        let secs = rand::thread_rng().gen_range(min..=widened_max);
        Duration::from_secs(secs)
    }

    /// Fetches a page, retrying through the session and falling back once
    /// to a plain session-less request
    ///
    /// # Arguments
    ///
    /// * `url` - The page to fetch
    /// * `stop` - Stop token; backoff sleeps are cancellable through it
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - A valid page body
    /// * `Err(FetchError)` - Typed failure after the full budget
    pub async fn fetch(&mut self, url: &str, stop: &mut StopToken) -> Result<String, FetchError> {
        let ttl = Duration::from_secs(self.config.session_ttl_secs);
        let mut last_error = FetchError::Network {
            message: "no attempt made".to_string(),
        };

        for attempt in 1..=self.config.max_attempts {
            if stop.is_stopped() {
                return Err(FetchError::Cancelled);
            }

            // An expired session is never reused; replace it before the attempt
            if self.session.is_expired(ttl) {
                tracing::debug!("Session past TTL, replacing before attempt {}", attempt);
                self.reset_session();
            }

            match self.attempt(url).await {
                Ok(body) => {
                    if attempt > 1 {
                        tracing::info!("Fetch succeeded on attempt {} for {}", attempt, url);
                    }
                    return Ok(body);
                }
                Err(error) => {
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt,
                        self.config.max_attempts,
                        url,
                        error
                    );

                    // Blocking or incompleteness taints the session
                    if matches!(error, FetchError::Blocked | FetchError::Incomplete) {
                        self.reset_session();
                    }
                    last_error = error;
                }
            }

            if attempt < self.config.max_attempts {
                let delay = self.backoff_delay(attempt);
                tracing::debug!("Backing off {:?} before next attempt", delay);
                if !stop.sleep(delay).await {
                    return Err(FetchError::Cancelled);
                }
            }
        }

        // Degraded fallback: one plain request, no session, fresh headers
        tracing::warn!(
            "Attempt budget exhausted for {}, trying session-less fallback",
            url
        );
        match self.plain_attempt(url).await {
            Ok(body) => {
                tracing::info!("Fallback transport succeeded for {}", url);
                Ok(body)
            }
            Err(error) => Err(FetchError::Exhausted {
                attempts: self.config.max_attempts + 1,
                last: error.to_string(),
            }),
        }
    }

    /// One attempt through the current session
    async fn attempt(&mut self, url: &str) -> Result<String, FetchError> {
        let headers = random_headers();
        let cookie = self.session.cookie_header();

        let response = self
            .fetcher
            .fetch(url, &headers, cookie.as_deref())
            .await
            .map_err(|message| FetchError::Network { message })?;

        let body = self.validate(url, response)?;

        // Only a successful response updates the persisted session
        if let Err(e) = self.session.save(&self.session_path) {
            tracing::warn!("Could not persist session state: {}", e);
        }
        Ok(body)
    }

    /// The fallback attempt: no cookies, nothing persisted
    async fn plain_attempt(&mut self, url: &str) -> Result<String, FetchError> {
        let headers = random_headers();
        let response = self
            .fetcher
            .fetch(url, &headers, None)
            .await
            .map_err(|message| FetchError::Network { message })?;

        self.validate_stateless(url, &response)
            .map(|()| response.body)
    }

    /// Validates a response and absorbs its cookies into the session
    fn validate(&mut self, url: &str, response: RawResponse) -> Result<String, FetchError> {
        self.validate_status(url, response.status)?;

        match classify_body(&response.body, &self.config.content_selector) {
            PageValidity::Valid => {
                self.session.absorb_set_cookies(&response.set_cookies);
                Ok(response.body)
            }
            PageValidity::Blocked => Err(FetchError::Blocked),
            PageValidity::Incomplete => {
                tracing::debug!(
                    "Incomplete page for {} ({} bytes, no content marker)",
                    url,
                    response.body.len()
                );
                Err(FetchError::Incomplete)
            }
        }
    }

    /// Validity checks without touching session state (fallback path)
    fn validate_stateless(&self, url: &str, response: &RawResponse) -> Result<(), FetchError> {
        self.validate_status(url, response.status)?;
        match classify_body(&response.body, &self.config.content_selector) {
            PageValidity::Valid => Ok(()),
            PageValidity::Blocked => Err(FetchError::Blocked),
            PageValidity::Incomplete => Err(FetchError::Incomplete),
        }
    }

    fn validate_status(&self, url: &str, status: u16) -> Result<(), FetchError> {
        if (200..400).contains(&status) {
            Ok(())
        } else {
            Err(FetchError::Network {
                message: format!("HTTP {} for {}", status, url),
            })
        }
    }
}
