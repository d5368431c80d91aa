//! Per-message and per-run result reporting.

use std::path::PathBuf;

/// Terminal state of one candidate message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Already in the ledger; nothing was fetched or written.
    Skipped,
    /// Fetched, routed, written, and recorded in the ledger.
    Recorded,
    /// Fetch or ledger write failed; the id will be retried next run.
    Failed,
}

/// What happened to a single message, built up step by step as the
/// pipeline works through it.
#[derive(Debug, Clone)]
pub struct MessageOutcome {
    pub id: String,
    pub disposition: Disposition,
    /// Whether the full message was retrieved from the service.
    pub fetched: bool,
    /// Destination folder, once routing has happened.
    pub folder: Option<PathBuf>,
    pub attachments_saved: usize,
    pub attachments_failed: usize,
    pub content_saved: bool,
    /// Bytes written to disk for this message.
    pub bytes_written: u64,
}

impl MessageOutcome {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            disposition: Disposition::Failed,
            fetched: false,
            folder: None,
            attachments_saved: 0,
            attachments_failed: 0,
            content_saved: false,
            bytes_written: 0,
        }
    }

    pub fn skipped(id: impl Into<String>) -> Self {
        Self {
            disposition: Disposition::Skipped,
            ..Self::new(id)
        }
    }
}

/// Statistics returned by a pipeline run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Distinct message ids matched across all queries, before the ledger
    /// filter.
    pub candidates: usize,
    /// Messages newly processed and recorded this run (the quota consumers).
    pub processed: usize,
    /// Messages skipped because the ledger already held them.
    pub skipped: usize,
    /// Messages that failed to fetch or record.
    pub failed: usize,
    pub attachments_saved: usize,
    pub attachments_failed: usize,
    /// Content text files written.
    pub content_written: usize,
    /// Total bytes written to disk (attachments plus content files).
    pub bytes_written: u64,
    pub outcomes: Vec<MessageOutcome>,
}

impl RunSummary {
    /// Fold one message outcome into the run totals.
    pub fn merge(&mut self, outcome: MessageOutcome) {
        match outcome.disposition {
            Disposition::Skipped => self.skipped += 1,
            Disposition::Recorded => self.processed += 1,
            Disposition::Failed => self.failed += 1,
        }
        self.attachments_saved += outcome.attachments_saved;
        self.attachments_failed += outcome.attachments_failed;
        self.bytes_written += outcome.bytes_written;
        if outcome.content_saved {
            self.content_written += 1;
        }
        self.outcomes.push(outcome);
    }
}
