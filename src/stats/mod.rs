//! Request statistics ledger
//!
//! A bounded-history success/error tracker used for health reporting. Every
//! fetch outcome appends one record to a ring buffer (oldest evicted on
//! overflow) and bumps a monotonically increasing per-keyword-set counter.
//! State is serialized to one JSON file on every mutation; a corrupt or
//! missing file at startup means empty state, never a failure.

mod ledger;

pub use ledger::{
    KeywordSetCounters, OutcomeStatus, OverallStats, StatsLedger, StatsRecord,
    DEFAULT_HISTORY_CAPACITY,
};
