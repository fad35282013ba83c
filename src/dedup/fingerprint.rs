//! Listing fingerprinting
//!
//! A fingerprint is the hex-encoded SHA-256 digest of a listing's canonical
//! URL. Two listings with the same URL always produce the same fingerprint,
//! across runs and processes.

use sha2::{Digest, Sha256};
use url::Url;

/// A listing fingerprint: 64 hex characters (256 bits)
pub type Fingerprint = String;

/// Computes the fingerprint for a listing URL
///
/// The URL is canonicalized first (parsed and re-serialized, fragment
/// stripped) so that cosmetic variations of the same listing link collapse
/// to one fingerprint. URLs that fail to parse are hashed verbatim rather
/// than dropped; a malformed-but-stable URL still deduplicates correctly.
///
/// # Arguments
///
/// * `url` - The listing URL as extracted from the page
pub fn fingerprint(url: &str) -> Fingerprint {
    let canonical = canonicalize(url);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonicalizes a listing URL for fingerprinting
fn canonicalize(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}
