//! Durable fingerprint store
//!
//! An append-only, newline-delimited log of hex digests backing an in-memory
//! set. The log is loaded fully at startup; each commit appends one record
//! and never rewrites existing data. There is no eviction: marketplace IDs
//! are assumed not to recur at a scale that matters, and callers needing
//! bounded memory must layer retention externally.

use crate::dedup::fingerprint::Fingerprint;
use crate::StorageResult;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Durable set of seen-listing fingerprints
pub struct FingerprintStore {
    path: PathBuf,
    seen: HashSet<Fingerprint>,
}

impl FingerprintStore {
    /// Opens the store, loading all persisted fingerprints into memory
    ///
    /// A missing log file is treated as an empty store. Malformed lines
    /// (wrong length or non-hex) are skipped with a warning, never fatal.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut seen = HashSet::new();

        match File::open(path) {
            Ok(file) => {
                let reader = BufReader::new(file);
                let mut skipped = 0usize;
                for line in reader.lines() {
                    let line = line?;
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line.len() == 64 && line.chars().all(|c| c.is_ascii_hexdigit()) {
                        seen.insert(line.to_string());
                    } else {
                        skipped += 1;
                    }
                }
                if skipped > 0 {
                    tracing::warn!(
                        "Skipped {} malformed fingerprint records in {}",
                        skipped,
                        path.display()
                    );
                }
                tracing::info!(
                    "Loaded {} fingerprints from {}",
                    seen.len(),
                    path.display()
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No fingerprint log at {}, starting empty", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path: path.to_path_buf(),
            seen,
        })
    }

    /// Pure membership check: has this fingerprint never been committed?
    pub fn is_new(&self, fp: &str) -> bool {
        !self.seen.contains(fp)
    }

    /// Commits a fingerprint: appends to the durable log and to the set
    ///
    /// The append is one write of `digest + "\n"`, so existing records are
    /// never truncated. Committing an already-known fingerprint is a no-op.
    pub fn commit(&mut self, fp: &Fingerprint) -> StorageResult<()> {
        if self.seen.contains(fp) {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format!("{}\n", fp).as_bytes())?;
        file.flush()?;

        self.seen.insert(fp.clone());
        Ok(())
    }

    /// Number of fingerprints currently known
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the store holds no fingerprints
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Full reset: truncates the log and clears the in-memory set
    ///
    /// The only way fingerprints are ever removed.
    pub fn reset(&mut self) -> StorageResult<()> {
        File::create(&self.path)?;
        self.seen.clear();
        tracing::info!("Fingerprint store reset: {}", self.path.display());
        Ok(())
    }
}
