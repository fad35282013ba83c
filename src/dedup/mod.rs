//! Deduplication: listing fingerprints and the durable seen-set

mod fingerprint;
mod store;

pub use fingerprint::{fingerprint, Fingerprint};
pub use store::FingerprintStore;
