//! Rotating request headers
//!
//! Every attempt goes out with a user agent picked at random from a pool of
//! current desktop browser strings, plus a randomized forwarded-for address,
//! to keep consecutive requests from presenting an identical fingerprint.

use rand::Rng;

/// Pool of desktop browser user-agent strings rotated per request
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
];

/// One rotation of request headers
#[derive(Debug, Clone)]
pub struct RequestHeaders {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub forwarded_for: String,
}

/// Draws a randomized header rotation
pub fn random_headers() -> RequestHeaders {
    let mut rng = rand::thread_rng();
    let user_agent = USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())].to_string();
    let forwarded_for = format!(
        "{}.{}.{}.{}",
        rng.gen_range(1..=223u8),
        rng.gen_range(0..=255u8),
        rng.gen_range(0..=255u8),
        rng.gen_range(1..=254u8)
    );

    RequestHeaders {
        user_agent,
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        accept_language: "de-DE,de;q=0.9,en;q=0.7".to_string(),
        forwarded_for,
    }
}
