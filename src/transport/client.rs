//! Production page fetcher over reqwest

use crate::transport::{PageFetcher, RawResponse, RequestHeaders};
use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::Client;
use std::time::Duration;

/// Page fetcher backed by a shared `reqwest::Client`
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Builds the fetcher with sane crawl timeouts and compression
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &RequestHeaders,
        cookie: Option<&str>,
    ) -> Result<RawResponse, String> {
        let mut request = self
            .client
            .get(url)
            .header("User-Agent", &headers.user_agent)
            .header("Accept", &headers.accept)
            .header("Accept-Language", &headers.accept_language)
            .header("X-Forwarded-For", &headers.forwarded_for);

        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                format!("request timeout for {}", url)
            } else if e.is_connect() {
                format!("connection failed for {}", url)
            } else {
                e.to_string()
            }
        })?;

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();

        let body = response.text().await.map_err(|e| e.to_string())?;

        Ok(RawResponse {
            status,
            body,
            set_cookies,
        })
    }
}
