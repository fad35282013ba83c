//! Browser-like session state
//!
//! A session is the cookie jar plus a creation timestamp. A session older
//! than its TTL is never reused: the transport replaces it before the next
//! attempt and clears the persisted copy. State is written to a JSON file
//! after every successful fetch and loaded once at startup.

use crate::StorageResult;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Cookie-bearing session with a fixed time-to-live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Cookie name → value pairs captured from Set-Cookie headers
    cookies: HashMap<String, String>,
    /// When this session was created
    created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a fresh, cookie-less session stamped now
    pub fn new() -> Self {
        Self {
            cookies: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Loads a persisted session, falling back to a fresh one
    ///
    /// An unreadable or corrupt session file is not an error; the monitor
    /// simply starts with a fresh session.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(
                        "Session file {} is corrupt ({}), starting fresh",
                        path.display(),
                        e
                    );
                    Self::new()
                }
            },
            Err(_) => Self::new(),
        }
    }

    /// Persists the session state to `path`
    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Removes the persisted session state, if any
    pub fn clear_persisted(path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Could not remove session file {}: {}", path.display(), e);
            }
        }
    }

    /// Whether the session has outlived its TTL at time `now`
    pub fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now - self.created_at;
        age > ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::zero())
    }

    /// Whether the session has outlived its TTL right now
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.is_expired_at(ttl, Utc::now())
    }

    /// Absorbs Set-Cookie header values from a response
    ///
    /// Only the leading `name=value` pair of each header is kept; attributes
    /// (Path, Expires, ...) are dropped.
    pub fn absorb_set_cookies<I, S>(&mut self, set_cookies: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for raw in set_cookies {
            let raw = raw.as_ref();
            let pair = raw.split(';').next().unwrap_or("");
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    self.cookies.insert(name.to_string(), value.trim().to_string());
                }
            }
        }
    }

    /// Renders the Cookie request header, or None when the jar is empty
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();
        Some(pairs.join("; "))
    }

    /// Number of cookies held
    pub fn cookie_count(&self) -> usize {
        self.cookies.len()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
