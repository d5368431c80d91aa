//! Append-only ledger of processed message ids.
//!
//! One id per line, UTF-8, no ordering guarantee beyond append order.
//! The ledger is what makes runs resumable: an id present here is never
//! fetched again, so interrupting a run and restarting it picks up where
//! the previous run left off.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{HarvestError, Result};

/// Persistent record of every message id that completed processing.
///
/// The file only grows. `record` appends and syncs before returning, so a
/// recorded id survives even if the process dies right after. A single run
/// is the only writer; there is no locking.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    seen: HashSet<String>,
}

impl Ledger {
    /// Load the ledger, treating a missing file as empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut seen = HashSet::new();

        if path.exists() {
            let file = File::open(&path).map_err(|e| HarvestError::io(&path, e))?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|e| HarvestError::io(&path, e))?;
                let id = line.trim();
                if !id.is_empty() {
                    seen.insert(id.to_string());
                }
            }
        }

        debug!(path = %path.display(), count = seen.len(), "Ledger loaded");
        Ok(Self { path, seen })
    }

    /// Whether `id` has already been recorded.
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Number of recorded ids.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Append `id` to the file and sync it to disk.
    ///
    /// Recording an id that is already present is a no-op, so the file
    /// holds each id exactly once.
    pub fn record(&mut self, id: &str) -> Result<()> {
        if self.seen.contains(id) {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| HarvestError::io(&self.path, e))?;
        writeln!(file, "{id}").map_err(|e| HarvestError::io(&self.path, e))?;
        file.sync_all().map_err(|e| HarvestError::io(&self.path, e))?;

        self.seen.insert(id.to_string());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
