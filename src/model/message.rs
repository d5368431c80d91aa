//! Wire-shaped message types as returned by the mail service.
//!
//! Field names follow the Gmail v1 JSON schema (`threadId`, `mimeType`,
//! `attachmentId`), mapped to snake case via serde renames so a snapshot
//! file or API response deserializes directly into these structs.

use serde::{Deserialize, Serialize};

/// Fallback subject for messages without a `Subject` header.
pub const NO_SUBJECT: &str = "無主旨";
/// Fallback sender for messages without a `From` header.
pub const NO_SENDER: &str = "無寄件者";
/// Fallback date for messages without a `Date` header.
pub const NO_DATE: &str = "無日期";

/// A single row of a list-messages result: just enough to fetch the rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId", default)]
    pub thread_id: String,
}

/// One RFC 822 header as the service reports it, name case preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Payload of a leaf part.
///
/// A part that carries content populates exactly one of `data` (inline,
/// base64url text) or `attachment_id` (fetched separately). When a service
/// reports both, inline `data` takes precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartBody {
    #[serde(rename = "attachmentId", skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,

    /// Base64url-encoded content bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// One node of the MIME part tree.
///
/// Interior nodes (`multipart/*`) carry `parts`; leaves carry `body`.
/// `filename` is empty for non-attachment parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,

    #[serde(default)]
    pub filename: String,

    #[serde(default)]
    pub headers: Vec<Header>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<PartBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<Part>>,
}

/// A fully fetched message: id plus the root of its part tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "threadId", default)]
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Part>,
}

impl Message {
    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| {
            p.headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.as_str())
        })
    }

    /// Subject line, or the literal no-subject marker.
    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or(NO_SUBJECT)
    }

    /// Sender, or the literal no-sender marker.
    pub fn from(&self) -> &str {
        self.header("From").unwrap_or(NO_SENDER)
    }

    /// Date header verbatim, or the literal no-date marker.
    pub fn date(&self) -> &str {
        self.header("Date").unwrap_or(NO_DATE)
    }

    /// Date header if present, for callers that need to distinguish absence.
    pub fn date_header(&self) -> Option<&str> {
        self.header("Date")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_gmail_shaped_json() {
        let json = r#"{
            "id": "msg-1",
            "threadId": "thr-1",
            "payload": {
                "mimeType": "multipart/mixed",
                "filename": "",
                "headers": [
                    {"name": "Subject", "value": "Invoice March"},
                    {"name": "From", "value": "billing@example.com"},
                    {"name": "Date", "value": "Tue, 05 Mar 2024 10:00:00 +0800"}
                ],
                "parts": [
                    {
                        "mimeType": "text/plain",
                        "filename": "",
                        "body": {"data": "SGVsbG8", "size": 5}
                    },
                    {
                        "mimeType": "application/pdf",
                        "filename": "invoice.pdf",
                        "body": {"attachmentId": "att-1", "size": 1024}
                    }
                ]
            }
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "msg-1");
        assert_eq!(msg.thread_id, "thr-1");
        assert_eq!(msg.subject(), "Invoice March");

        let payload = msg.payload.as_ref().unwrap();
        let parts = payload.parts.as_ref().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].filename, "invoice.pdf");
        assert_eq!(
            parts[1].body.as_ref().unwrap().attachment_id.as_deref(),
            Some("att-1")
        );
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let msg = Message {
            id: "m".into(),
            thread_id: "t".into(),
            payload: Some(Part {
                headers: vec![Header {
                    name: "SUBJECT".into(),
                    value: "hello".into(),
                }],
                ..Default::default()
            }),
        };
        assert_eq!(msg.header("subject"), Some("hello"));
        assert_eq!(msg.subject(), "hello");
    }

    #[test]
    fn test_missing_headers_fall_back_to_markers() {
        let msg = Message {
            id: "m".into(),
            thread_id: "t".into(),
            payload: None,
        };
        assert_eq!(msg.subject(), NO_SUBJECT);
        assert_eq!(msg.from(), NO_SENDER);
        assert_eq!(msg.date(), NO_DATE);
        assert!(msg.date_header().is_none());
    }

    #[test]
    fn test_missing_thread_id_defaults_to_empty() {
        let msg: MessageRef = serde_json::from_str(r#"{"id": "only-id"}"#).unwrap();
        assert_eq!(msg.id, "only-id");
        assert!(msg.thread_id.is_empty());
    }
}
