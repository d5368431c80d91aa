//! In-process mail service backed by seeded messages or a JSON snapshot.
//!
//! This is the backend the test suite runs against and what the CLI's
//! `--snapshot` mode uses, so whole runs work offline. It understands the
//! query syntax the query builder emits: `subject:` tokens match the
//! Subject header case-insensitively, `after:`/`before:` bound the Date
//! header (`after:` inclusive, `before:` exclusive, like the real
//! service), and anything else is ignored.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::model::message::{Message, MessageRef};
use crate::query::DATE_FORMAT;
use crate::route::parse_header_date;
use crate::service::{AttachmentData, MailService};

/// On-disk mailbox snapshot: full messages plus out-of-line payloads.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Attachment id to base64url payload.
    #[serde(default)]
    pub attachments: HashMap<String, String>,
}

/// In-memory [`MailService`] implementation.
#[derive(Debug, Default)]
pub struct MemoryMailService {
    messages: Vec<Message>,
    attachments: HashMap<String, String>,
    fail_messages: HashSet<String>,
    fail_attachments: HashSet<String>,
    fail_queries: Vec<String>,
}

impl MemoryMailService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a mailbox from a JSON snapshot file.
    pub fn from_snapshot_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
        let snapshot: Snapshot =
            serde_json::from_str(&contents).map_err(|e| HarvestError::InvalidSnapshot {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            messages: snapshot.messages,
            attachments: snapshot.attachments,
            ..Self::default()
        }
    }

    /// Seed one message; list order follows seeding order.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Seed an out-of-line attachment payload (base64url text).
    pub fn insert_attachment(&mut self, id: impl Into<String>, data: impl Into<String>) {
        self.attachments.insert(id.into(), data.into());
    }

    /// Make `get_message` fail for this id.
    pub fn fail_message(&mut self, id: impl Into<String>) {
        self.fail_messages.insert(id.into());
    }

    /// Make `get_attachment` fail for this attachment id.
    pub fn fail_attachment(&mut self, id: impl Into<String>) {
        self.fail_attachments.insert(id.into());
    }

    /// Make `list_messages` fail for any query containing `needle`.
    pub fn fail_query(&mut self, needle: impl Into<String>) {
        self.fail_queries.push(needle.into());
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    fn matches(message: &Message, query: &str) -> bool {
        for token in query.split_whitespace() {
            if let Some(keyword) = token.strip_prefix("subject:") {
                let subject = match message.header("Subject") {
                    Some(s) => s.to_lowercase(),
                    None => return false,
                };
                if !subject.contains(&keyword.to_lowercase()) {
                    return false;
                }
            } else if let Some(bound) = token.strip_prefix("after:") {
                if !date_satisfies(message, bound, |date, bound| date >= bound) {
                    return false;
                }
            } else if let Some(bound) = token.strip_prefix("before:") {
                if !date_satisfies(message, bound, |date, bound| date < bound) {
                    return false;
                }
            }
            // Anything else is ignored.
        }
        true
    }
}

/// Apply a date bound. An unparseable bound is ignored; a message
/// without a parseable Date header never satisfies a bound.
fn date_satisfies(
    message: &Message,
    bound: &str,
    cmp: impl Fn(NaiveDate, NaiveDate) -> bool,
) -> bool {
    let bound = match NaiveDate::parse_from_str(bound, DATE_FORMAT) {
        Ok(b) => b,
        Err(_) => return true,
    };
    match message.date_header().and_then(parse_header_date) {
        Some(date) => cmp(date, bound),
        None => false,
    }
}

impl MailService for MemoryMailService {
    fn list_messages(&self, query: &str) -> Result<Vec<MessageRef>> {
        if self.fail_queries.iter().any(|n| query.contains(n.as_str())) {
            return Err(HarvestError::Transport(format!(
                "query failed: {query}"
            )));
        }

        Ok(self
            .messages
            .iter()
            .filter(|m| Self::matches(m, query))
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect())
    }

    fn get_message(&self, id: &str) -> Result<Message> {
        if self.fail_messages.contains(id) {
            return Err(HarvestError::Transport(format!(
                "message fetch failed: {id}"
            )));
        }
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| HarvestError::Transport(format!("no such message: {id}")))
    }

    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<AttachmentData> {
        if self.fail_attachments.contains(attachment_id) {
            return Err(HarvestError::Transport(format!(
                "attachment fetch failed: {message_id}/{attachment_id}"
            )));
        }
        self.attachments
            .get(attachment_id)
            .map(|data| AttachmentData { data: data.clone() })
            .ok_or_else(|| {
                HarvestError::Transport(format!("no such attachment: {attachment_id}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{Header, Part};

    fn message(id: &str, subject: &str, date: &str) -> Message {
        let mut headers = vec![Header {
            name: "Subject".to_string(),
            value: subject.to_string(),
        }];
        if !date.is_empty() {
            headers.push(Header {
                name: "Date".to_string(),
                value: date.to_string(),
            });
        }
        Message {
            id: id.to_string(),
            thread_id: format!("thr-{id}"),
            payload: Some(Part {
                mime_type: "text/plain".to_string(),
                headers,
                ..Default::default()
            }),
        }
    }

    fn ids(refs: &[MessageRef]) -> Vec<&str> {
        refs.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_empty_query_matches_all() {
        let mut svc = MemoryMailService::new();
        svc.push_message(message("a", "one", ""));
        svc.push_message(message("b", "two", ""));

        let refs = svc.list_messages("").unwrap();
        assert_eq!(ids(&refs), ["a", "b"]);
    }

    #[test]
    fn test_subject_token_is_substring_case_insensitive() {
        let mut svc = MemoryMailService::new();
        svc.push_message(message("a", "Monthly INVOICE attached", ""));
        svc.push_message(message("b", "receipt", ""));

        let refs = svc.list_messages("subject:invoice").unwrap();
        assert_eq!(ids(&refs), ["a"]);
    }

    #[test]
    fn test_date_window() {
        let mut svc = MemoryMailService::new();
        svc.push_message(message("old", "x", "Mon, 01 Jan 2024 09:00:00 +0000"));
        svc.push_message(message("mid", "x", "Tue, 05 Mar 2024 09:00:00 +0000"));
        svc.push_message(message("new", "x", "Fri, 14 Jun 2024 09:00:00 +0000"));

        let refs = svc
            .list_messages("after:2024/02/01 before:2024/06/01")
            .unwrap();
        assert_eq!(ids(&refs), ["mid"]);
    }

    #[test]
    fn test_after_inclusive_before_exclusive() {
        let mut svc = MemoryMailService::new();
        svc.push_message(message("on-start", "x", "Thu, 01 Feb 2024 09:00:00 +0000"));
        svc.push_message(message("on-end", "x", "Sat, 01 Jun 2024 09:00:00 +0000"));

        let refs = svc
            .list_messages("after:2024/02/01 before:2024/06/01")
            .unwrap();
        assert_eq!(ids(&refs), ["on-start"]);
    }

    #[test]
    fn test_dateless_message_fails_date_bounds() {
        let mut svc = MemoryMailService::new();
        svc.push_message(message("no-date", "x", ""));

        let refs = svc.list_messages("after:2024/01/01").unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn test_unknown_tokens_ignored() {
        let mut svc = MemoryMailService::new();
        svc.push_message(message("a", "invoice", ""));

        let refs = svc.list_messages("subject:invoice in:inbox").unwrap();
        assert_eq!(ids(&refs), ["a"]);
    }

    #[test]
    fn test_failure_injection() {
        let mut svc = MemoryMailService::new();
        svc.push_message(message("a", "x", ""));
        svc.fail_message("a");
        svc.fail_query("subject:boom");

        assert!(svc.get_message("a").is_err());
        assert!(svc.list_messages("subject:boom").is_err());
        assert!(svc.list_messages("").is_ok());
    }

    #[test]
    fn test_missing_lookups_are_transport_errors() {
        let svc = MemoryMailService::new();
        assert!(matches!(
            svc.get_message("ghost"),
            Err(HarvestError::Transport(_))
        ));
        assert!(matches!(
            svc.get_attachment("m", "ghost"),
            Err(HarvestError::Transport(_))
        ));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = r#"{
            "messages": [
                {"id": "m1", "threadId": "t1", "payload": {
                    "mimeType": "text/plain",
                    "headers": [{"name": "Subject", "value": "hello"}]
                }}
            ],
            "attachments": {"att-1": "SGVsbG8="}
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let svc = MemoryMailService::from_snapshot(snapshot);

        assert_eq!(svc.message_count(), 1);
        let refs = svc.list_messages("subject:hello").unwrap();
        assert_eq!(ids(&refs), ["m1"]);
        assert_eq!(svc.get_attachment("m1", "att-1").unwrap().data, "SGVsbG8=");
    }
}
