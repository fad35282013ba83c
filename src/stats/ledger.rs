use crate::StorageResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Default ring-buffer capacity for outcome records
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Outcome of one recorded fetch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Page fetched and extracted
    Success {
        /// Qualifying listings found on the page
        ads_found: u32,
    },
    /// Page abandoned after its retry budget
    Error {
        /// Error classification (e.g. "blocked", "exhausted")
        error_type: String,
        /// Human-readable detail
        message: String,
    },
}

/// One entry in the bounded outcome history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsRecord {
    pub timestamp: DateTime<Utc>,
    /// Normalized keyword-set string this fetch was for
    pub keyword_set: String,
    /// Result page number
    pub page: u32,
    #[serde(flatten)]
    pub outcome: OutcomeStatus,
}

/// Monotonic per-keyword-set counters (never evicted)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordSetCounters {
    pub successes: u64,
    pub errors: u64,
    pub ads_found: u64,
}

/// Aggregate view computed from the retained history window
#[derive(Debug, Clone, PartialEq)]
pub struct OverallStats {
    pub total: usize,
    pub successes: usize,
    pub errors: usize,
    /// successes / total within the retained window, 0.0 when empty
    pub success_rate: f64,
}

/// Serialized ledger state
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerState {
    history: VecDeque<StatsRecord>,
    counters: HashMap<String, KeywordSetCounters>,
}

/// Durable bounded-history outcome tracker
pub struct StatsLedger {
    path: PathBuf,
    capacity: usize,
    state: LedgerState,
}

impl StatsLedger {
    /// Opens the ledger, loading prior state from `path`
    ///
    /// A missing or unparseable file yields an empty ledger.
    pub fn open(path: &Path) -> Self {
        Self::with_capacity(path, DEFAULT_HISTORY_CAPACITY)
    }

    /// Opens the ledger with an explicit history capacity
    pub fn with_capacity(path: &Path, capacity: usize) -> Self {
        let state = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<LedgerState>(&content) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        "Stats file {} is corrupt ({}), starting empty",
                        path.display(),
                        e
                    );
                    LedgerState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerState::default(),
            Err(e) => {
                tracing::warn!(
                    "Could not read stats file {} ({}), starting empty",
                    path.display(),
                    e
                );
                LedgerState::default()
            }
        };

        Self {
            path: path.to_path_buf(),
            capacity,
            state,
        }
    }

    /// Records a successful page fetch
    pub fn record_success(&mut self, keyword_set: &str, page: u32, ads_found: u32) {
        let counters = self
            .state
            .counters
            .entry(keyword_set.to_string())
            .or_default();
        counters.successes += 1;
        counters.ads_found += u64::from(ads_found);

        self.push_record(StatsRecord {
            timestamp: Utc::now(),
            keyword_set: keyword_set.to_string(),
            page,
            outcome: OutcomeStatus::Success { ads_found },
        });
    }

    /// Records a failed page fetch
    pub fn record_error(&mut self, keyword_set: &str, page: u32, error_type: &str, message: &str) {
        self.state
            .counters
            .entry(keyword_set.to_string())
            .or_default()
            .errors += 1;

        self.push_record(StatsRecord {
            timestamp: Utc::now(),
            keyword_set: keyword_set.to_string(),
            page,
            outcome: OutcomeStatus::Error {
                error_type: error_type.to_string(),
                message: message.to_string(),
            },
        });
    }

    fn push_record(&mut self, record: StatsRecord) {
        if self.state.history.len() >= self.capacity {
            self.state.history.pop_front();
        }
        self.state.history.push_back(record);

        if let Err(e) = self.persist() {
            // A stats write failure must never take down the monitor
            tracing::warn!("Failed to persist stats to {}: {}", self.path.display(), e);
        }
    }

    fn persist(&self) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Success rate over the retained window (not all-time)
    pub fn overall_stats(&self) -> OverallStats {
        let total = self.state.history.len();
        let successes = self
            .state
            .history
            .iter()
            .filter(|r| matches!(r.outcome, OutcomeStatus::Success { .. }))
            .count();
        let errors = total - successes;
        let success_rate = if total > 0 {
            successes as f64 / total as f64
        } else {
            0.0
        };

        OverallStats {
            total,
            successes,
            errors,
            success_rate,
        }
    }

    /// All-time counters keyed by normalized keyword-set string
    pub fn stats_by_keyword_set(&self) -> &HashMap<String, KeywordSetCounters> {
        &self.state.counters
    }

    /// The most recent error records, newest first
    pub fn recent_errors(&self, limit: usize) -> Vec<&StatsRecord> {
        self.state
            .history
            .iter()
            .rev()
            .filter(|r| matches!(r.outcome, OutcomeStatus::Error { .. }))
            .take(limit)
            .collect()
    }

    /// Writes a JSON snapshot of the full ledger state to `path`
    pub fn export_stats(&self, path: &Path) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Clears history and counters, persisting the empty state
    pub fn reset_stats(&mut self) -> StorageResult<()> {
        self.state = LedgerState::default();
        self.persist()
    }
}
