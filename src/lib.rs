//! Adwatch: a resilient classifieds-marketplace monitor
//!
//! This crate implements a long-running monitor that polls marketplace search
//! pages for keyword matches, deduplicates listings across runs, and pushes
//! new matches to a messaging channel in size-bounded batches. It maintains a
//! browser-like session against an anti-bot edge, with multi-tier retry and a
//! degraded fallback transport.

pub mod cancel;
pub mod config;
pub mod dedup;
pub mod extract;
pub mod monitor;
pub mod notify;
pub mod stats;
pub mod transport;

use thiserror::Error;

/// Main error type for Adwatch operations
#[derive(Debug, Error)]
pub enum AdwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] transport::FetchError),

    #[error("Notification error: {0}")]
    Notify(#[from] notify::NotifyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Another monitor instance holds the lock: {0}")]
    LockHeld(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors from the durable state files (fingerprint log, session, stats)
///
/// These never terminate the monitoring loop; callers log them and continue
/// with empty or skipped state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Adwatch operations
pub type Result<T> = std::result::Result<T, AdwatchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for durable-state operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// Re-export commonly used types
pub use config::Config;
pub use dedup::{fingerprint, FingerprintStore};
pub use extract::{Extractor, HtmlExtractor, Listing};
pub use monitor::{MonitorHandle, Scheduler};
pub use notify::{pack_results, Notifier};
pub use stats::StatsLedger;
pub use transport::{FetchError, TransportManager};
