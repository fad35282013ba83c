use serde::Deserialize;

/// Main configuration structure for Adwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    pub notify: NotifyConfig,
    pub storage: StorageConfig,
}

/// Search configuration: where to look and what to look for
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the marketplace (scheme + host)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Query path template; `{query}` and `{page}` are substituted
    /// (e.g. "/s-seite:{page}/{query}/k0")
    #[serde(rename = "query-template")]
    pub query_template: String,

    /// Keywords a listing title must contain at least one of
    pub keywords: Vec<String>,

    /// Keywords that disqualify a listing when present in its title
    #[serde(rename = "negative-keywords", default)]
    pub negative_keywords: Vec<String>,

    /// Keyword permutation strategy: "single" (the original set) or
    /// "rotate" (one query per rotation of the keyword list)
    #[serde(default = "default_permutations")]
    pub permutations: PermutationMode,

    /// Pages to walk per keyword permutation each cycle
    #[serde(rename = "max-pages-per-cycle", default = "default_max_pages")]
    pub max_pages_per_cycle: u32,

    /// CSS selector matching listing anchors on a result page
    #[serde(rename = "listing-selector", default = "default_listing_selector")]
    pub listing_selector: String,
}

fn default_listing_selector() -> String {
    "a.aditem-main--title".to_string()
}

/// Keyword permutation strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermutationMode {
    Single,
    Rotate,
}

fn default_permutations() -> PermutationMode {
    PermutationMode::Single
}

fn default_max_pages() -> u32 {
    3
}

/// Scheduling configuration: cadence, operating window, retry budgets
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Base cycle interval in minutes
    #[serde(rename = "base-interval-mins", default = "default_base_interval")]
    pub base_interval_mins: u64,

    /// Hard cap on the escalated interval in minutes
    #[serde(rename = "max-interval-mins", default = "default_max_interval")]
    pub max_interval_mins: u64,

    /// Multiplier applied to the interval when the empty-page threshold is hit
    #[serde(rename = "interval-multiplier", default = "default_multiplier")]
    pub interval_multiplier: u64,

    /// Consecutive empty pages before the interval escalates
    #[serde(rename = "empty-page-threshold", default = "default_empty_threshold")]
    pub empty_page_threshold: u32,

    /// Fixed wait between cycles in minutes
    #[serde(rename = "cycle-wait-mins", default = "default_cycle_wait")]
    pub cycle_wait_mins: u64,

    /// Operating window start hour (inclusive, local to the offset zone)
    #[serde(rename = "window-start-hour", default = "default_window_start")]
    pub window_start_hour: u32,

    /// Operating window end hour (exclusive)
    #[serde(rename = "window-end-hour", default = "default_window_end")]
    pub window_end_hour: u32,

    /// Fixed UTC offset (hours) the window is evaluated in
    #[serde(rename = "utc-offset-hours", default = "default_utc_offset")]
    pub utc_offset_hours: i32,

    /// Per-page fetch attempt budget; intentionally large so a page is not
    /// abandoned prematurely under transient blocking
    #[serde(rename = "max-page-attempts", default = "default_page_attempts")]
    pub max_page_attempts: u32,

    /// Lower bound of the randomized inter-attempt delay (seconds)
    #[serde(rename = "page-retry-min-secs", default = "default_page_retry_min")]
    pub page_retry_min_secs: u64,

    /// Upper bound of the randomized inter-attempt delay (seconds)
    #[serde(rename = "page-retry-max-secs", default = "default_page_retry_max")]
    pub page_retry_max_secs: u64,
}

fn default_base_interval() -> u64 {
    20
}

fn default_max_interval() -> u64 {
    50
}

fn default_multiplier() -> u64 {
    5
}

fn default_empty_threshold() -> u32 {
    3
}

fn default_cycle_wait() -> u64 {
    30
}

fn default_window_start() -> u32 {
    6
}

fn default_window_end() -> u32 {
    23
}

fn default_utc_offset() -> i32 {
    1
}

fn default_page_attempts() -> u32 {
    100
}

fn default_page_retry_min() -> u64 {
    5
}

fn default_page_retry_max() -> u64 {
    15
}

/// Transport configuration: session lifetime and retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Session time-to-live in seconds
    #[serde(rename = "session-ttl-secs", default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Fetch attempts per logical request before the fallback transport
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the randomized inter-attempt backoff (seconds)
    #[serde(rename = "backoff-min-secs", default = "default_backoff_min")]
    pub backoff_min_secs: u64,

    /// Upper bound of the randomized inter-attempt backoff (seconds)
    #[serde(rename = "backoff-max-secs", default = "default_backoff_max")]
    pub backoff_max_secs: u64,

    /// CSS selector a valid result page must contain at least one match for
    #[serde(rename = "content-selector", default = "default_content_selector")]
    pub content_selector: String,

    /// Request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            max_attempts: default_max_attempts(),
            backoff_min_secs: default_backoff_min(),
            backoff_max_secs: default_backoff_max(),
            content_selector: default_content_selector(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_session_ttl() -> u64 {
    1800
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_min() -> u64 {
    60
}

fn default_backoff_max() -> u64 {
    120
}

fn default_content_selector() -> String {
    "#srchrslt-adtable".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Telegram bot token
    #[serde(rename = "bot-token")]
    pub bot_token: String,

    /// Telegram chat the messages are sent to
    #[serde(rename = "chat-id")]
    pub chat_id: String,

    /// Listings per outbound message chunk
    #[serde(rename = "chunk-size", default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Hard per-message character limit of the delivery transport
    #[serde(rename = "max-message-chars", default = "default_max_chars")]
    pub max_message_chars: usize,

    /// Delay between chunk sends in milliseconds
    #[serde(rename = "inter-chunk-delay-ms", default = "default_chunk_delay")]
    pub inter_chunk_delay_ms: u64,
}

fn default_chunk_size() -> usize {
    20
}

fn default_max_chars() -> usize {
    4096
}

fn default_chunk_delay() -> u64 {
    1000
}

/// Durable state layout
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the fingerprint log, session state, stats file,
    /// and the single-instance lock
    #[serde(rename = "data-dir")]
    pub data_dir: String,
}
