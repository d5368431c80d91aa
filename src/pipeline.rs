//! The ingestion run: query, deduplicate, fetch, route, write, record.
//!
//! A run is strictly sequential. Failures are contained at the smallest
//! useful scope: a failed query contributes no candidates, a failed fetch
//! or ledger append fails that one message, and a failed attachment write
//! leaves the message's other attachments alone. A failed message never
//! consumes quota, so a later run picks it up again.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::{Config, SearchConfig};
use crate::error::{HarvestError, Result};
use crate::extract::{self, AttachmentRef, AttachmentSource};
use crate::ledger::Ledger;
use crate::model::message::{Message, MessageRef, Part};
use crate::model::report::{Disposition, MessageOutcome, RunSummary};
use crate::query;
use crate::route::{self, Router};
use crate::service::MailService;

/// Body marker written when a message yields no text at all.
const UNPARSEABLE_CONTENT: &str = "無法解析郵件內容";

/// Drives one ingestion run against a mail service.
///
/// Construction loads the ledger from disk; [`Pipeline::run`] then works
/// through the candidates and returns a [`RunSummary`]. The pipeline owns
/// no long-lived state beyond the ledger, so one value per run is the
/// expected shape.
pub struct Pipeline<S: MailService> {
    service: S,
    router: Router,
    ledger: Ledger,
    search: SearchConfig,
    download_root: PathBuf,
    file_types: Vec<String>,
    content: bool,
    limit: usize,
}

impl<S: MailService> Pipeline<S> {
    /// Build a pipeline from configuration, loading the ledger.
    pub fn new(service: S, config: &Config) -> Result<Self> {
        let ledger = Ledger::load(&config.ledger.path)?;
        let router = Router::new(route::parse_rules(&config.routing.rules));
        Ok(Self {
            service,
            router,
            ledger,
            search: config.search.clone(),
            download_root: config.download.root.clone(),
            file_types: config.download.file_types.clone(),
            content: config.download.content,
            limit: config.download.limit,
        })
    }

    /// Number of ids already recorded in the ledger.
    pub fn recorded(&self) -> usize {
        self.ledger.len()
    }

    /// Run without progress reporting.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_with_progress(None)
    }

    /// Run the full sequence: build queries, collect candidates, process
    /// up to the per-run limit.
    ///
    /// `progress` is called with `(handled, total)` before each candidate;
    /// returning `false` stops the run before the next message. An early
    /// stop still returns the summary of everything done so far.
    pub fn run_with_progress(
        &mut self,
        progress: Option<&dyn Fn(usize, usize) -> bool>,
    ) -> Result<RunSummary> {
        fs::create_dir_all(&self.download_root)
            .map_err(|e| HarvestError::io(&self.download_root, e))?;

        let date_filter = match query::date_query(&self.search) {
            Ok(filter) => filter,
            Err(e) => {
                error!(error = %e, "Bad explicit dates, searching without a date window");
                String::new()
            }
        };
        let queries = query::build_queries(&self.search.subjects, &date_filter);

        let candidates = self.collect_candidates(&queries);
        // The quota is clamped against the candidate count before the
        // ledger filter, so skips can exhaust a run.
        let quota = self.limit.min(candidates.len());
        info!(
            candidates = candidates.len(),
            quota = quota,
            recorded = self.ledger.len(),
            "Candidates collected"
        );

        let mut summary = RunSummary {
            candidates: candidates.len(),
            ..RunSummary::default()
        };

        let total = candidates.len();
        for (handled, candidate) in candidates.iter().enumerate() {
            if summary.processed >= quota {
                break;
            }
            if let Some(report) = progress {
                if !report(handled, total) {
                    info!("Run stopped at the caller's request");
                    break;
                }
            }

            if self.ledger.contains(&candidate.id) {
                info!(id = %candidate.id, "Skipping already recorded message");
                summary.merge(MessageOutcome::skipped(candidate.id.as_str()));
                continue;
            }

            let outcome = self.handle_message(&candidate.id);
            summary.merge(outcome);
        }

        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            attachments = summary.attachments_saved,
            "Run finished"
        );
        Ok(summary)
    }

    /// Issue every query and union the results, deduplicating by message
    /// id while preserving first-seen order. A failed query is logged and
    /// contributes nothing.
    fn collect_candidates(&self, queries: &[String]) -> Vec<MessageRef> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for q in queries {
            let refs = match self.service.list_messages(q) {
                Ok(refs) => refs,
                Err(e) => {
                    warn!(query = q.as_str(), error = %e, "Query failed, treating as empty");
                    continue;
                }
            };
            debug!(query = q.as_str(), matched = refs.len(), "Query returned");
            for r in refs {
                if seen.insert(r.id.clone()) {
                    candidates.push(r);
                }
            }
        }
        candidates
    }

    /// Fetch, route, and write out a single message.
    ///
    /// Never returns an error; every failure is folded into the outcome so
    /// the caller keeps going. The ledger is appended only after the fetch
    /// succeeded, and only a recorded message counts against the quota.
    fn handle_message(&mut self, id: &str) -> MessageOutcome {
        let mut outcome = MessageOutcome::new(id);

        let message = match self.service.get_message(id) {
            Ok(message) => message,
            Err(e) => {
                warn!(id = id, error = %e, "Failed to fetch message");
                return outcome;
            }
        };
        outcome.fetched = true;

        let folder = self.router.route(message.subject(), message.date_header());
        let dest = self.download_root.join(&folder);
        debug!(id = id, folder = %folder.display(), "Routed");
        outcome.folder = Some(folder);

        if let Err(e) = fs::create_dir_all(&dest).map_err(|e| HarvestError::io(&dest, e)) {
            warn!(id = id, error = %e, "Could not create message folder");
            permission_hint(&e);
            return outcome;
        }

        let empty = Part::default();
        let payload = message.payload.as_ref().unwrap_or(&empty);

        for attachment in extract::select_attachments(payload, &self.file_types) {
            match self.save_attachment(&message.id, &attachment, &dest) {
                Ok(bytes) => {
                    outcome.attachments_saved += 1;
                    outcome.bytes_written += bytes;
                }
                Err(e) => {
                    warn!(
                        id = %message.id,
                        filename = %attachment.filename,
                        error = %e,
                        "Failed to save attachment"
                    );
                    permission_hint(&e);
                    outcome.attachments_failed += 1;
                }
            }
        }

        if self.content {
            match self.save_content(&message, payload, &dest) {
                Ok(bytes) => {
                    outcome.content_saved = true;
                    outcome.bytes_written += bytes;
                }
                Err(e) => {
                    warn!(id = %message.id, error = %e, "Failed to save message content");
                    permission_hint(&e);
                }
            }
        }

        match self.ledger.record(&message.id) {
            Ok(()) => outcome.disposition = Disposition::Recorded,
            Err(e) => {
                error!(id = %message.id, error = %e, "Failed to record message in ledger");
            }
        }
        outcome
    }

    /// Resolve an attachment's bytes (inline, or via the service) and
    /// write them as `<dest>/<message id>_<sanitized filename>`.
    fn save_attachment(
        &self,
        message_id: &str,
        attachment: &AttachmentRef,
        dest: &Path,
    ) -> Result<u64> {
        let bytes = match &attachment.source {
            AttachmentSource::Inline(data) => extract::decode_base64(data)?,
            AttachmentSource::Remote(attachment_id) => {
                let body = self.service.get_attachment(message_id, attachment_id)?;
                extract::decode_base64(&body.data)?
            }
        };

        let path = dest.join(format!(
            "{message_id}_{}",
            extract::sanitize_filename(&attachment.filename)
        ));
        fs::write(&path, &bytes).map_err(|e| HarvestError::io(&path, e))?;
        debug!(path = %path.display(), size = bytes.len(), "Attachment saved");
        Ok(bytes.len() as u64)
    }

    /// Write `<dest>/<id>_content.txt`: the header block, a 50-dash
    /// divider, then the extracted body text.
    fn save_content(&self, message: &Message, payload: &Part, dest: &Path) -> Result<u64> {
        let text = extract::extract_text(payload);
        let body = if text.is_empty() {
            UNPARSEABLE_CONTENT
        } else {
            text.as_str()
        };
        let rendered = format!(
            "主題: {}\n寄件者: {}\n日期: {}\n郵件ID: {}\n{}\n\n{}",
            message.subject(),
            message.from(),
            message.date(),
            message.id,
            "-".repeat(50),
            body
        );

        let path = dest.join(format!("{}_content.txt", message.id));
        fs::write(&path, rendered.as_bytes()).map_err(|e| HarvestError::io(&path, e))?;
        debug!(path = %path.display(), "Content saved");
        Ok(rendered.len() as u64)
    }
}

/// Log an extra hint when an I/O failure is a permission problem.
fn permission_hint(err: &HarvestError) {
    if let HarvestError::Io { path, source } = err {
        if source.kind() == ErrorKind::PermissionDenied {
            warn!(
                path = %path.display(),
                "Permission denied, check write access to the downloads directory"
            );
        }
    }
}
