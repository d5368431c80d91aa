//! Content extraction: walk a message's MIME part tree to select
//! downloadable attachments and assemble plain-text body content.
//!
//! The extractor never fetches bytes itself. Attachment selection hands
//! back either the inline base64 payload or the attachment id; resolving
//! the id against the mail service is the pipeline's job.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use tracing::{info, warn};

use crate::error::{HarvestError, Result};
use crate::model::message::Part;

/// Where an attachment's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Base64url payload carried inline in the part body.
    Inline(String),
    /// Attachment id to resolve via the mail service.
    Remote(String),
}

/// One attachment selected for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub filename: String,
    pub source: AttachmentSource,
}

/// Walk the part tree and select every attachment whose extension is on
/// the allow-list.
///
/// Matching is case-insensitive (`data.CSV` matches `csv`); filenames
/// without an extension never match. Non-matches are logged and skipped.
/// When a part carries both inline data and an attachment id, the inline
/// data wins.
pub fn select_attachments(payload: &Part, allow_list: &[String]) -> Vec<AttachmentRef> {
    let allow: Vec<String> = allow_list
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let mut selected = Vec::new();
    collect_attachments(payload, &allow, &mut selected);
    selected
}

fn collect_attachments(part: &Part, allow: &[String], out: &mut Vec<AttachmentRef>) {
    if !part.filename.is_empty() {
        if extension_allowed(&part.filename, allow) {
            match attachment_source(part) {
                Some(source) => out.push(AttachmentRef {
                    filename: part.filename.clone(),
                    source,
                }),
                None => {
                    warn!(filename = %part.filename, "Attachment part carries no payload");
                }
            }
        } else {
            info!(filename = %part.filename, "Skipping attachment outside allow-list");
        }
    }

    if let Some(children) = &part.parts {
        for child in children {
            collect_attachments(child, allow, out);
        }
    }
}

/// Lowercased extension test against the allow-list.
fn extension_allowed(filename: &str, allow: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => allow.iter().any(|a| a == &ext.to_lowercase()),
        None => false,
    }
}

/// Inline data takes precedence over an attachment id.
fn attachment_source(part: &Part) -> Option<AttachmentSource> {
    let body = part.body.as_ref()?;
    if let Some(data) = &body.data {
        if !data.is_empty() {
            return Some(AttachmentSource::Inline(data.clone()));
        }
    }
    body.attachment_id
        .as_ref()
        .map(|id| AttachmentSource::Remote(id.clone()))
}

/// Assemble the message's text content from the part tree.
///
/// `text/plain` leaves contribute their decoded data; `text/html` leaves
/// are tag-stripped first. Internal nodes concatenate child results in
/// part order and contribute nothing of their own. A corrupt part is
/// skipped with a warning, never an error.
pub fn extract_text(payload: &Part) -> String {
    let mut content = String::new();
    append_text(payload, &mut content);
    content
}

fn append_text(part: &Part, out: &mut String) {
    if let Some(children) = &part.parts {
        for child in children {
            append_text(child, out);
        }
        return;
    }

    let data = match part.body.as_ref().and_then(|b| b.data.as_deref()) {
        Some(d) if !d.is_empty() => d,
        _ => return,
    };

    let decoded = match decode_base64(data) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(mime_type = %part.mime_type, error = %e, "Skipping undecodable part");
            return;
        }
    };

    match part.mime_type.as_str() {
        "text/plain" => out.push_str(&decoded),
        "text/html" => out.push_str(&strip_html(&decoded)),
        _ => {}
    }
}

/// Reduce HTML to text by deleting each `<...>` tag and collapsing
/// whitespace runs.
///
/// Entities are left as written (`&amp;` stays `&amp;`), a dangling `<`
/// is kept literally, and text on both sides of a deleted tag runs
/// together. Downstream consumers depend on this exact output, so it is
/// deliberately not a real HTML parser.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        text.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('>') {
            // A non-empty <...> span is a tag; it is dropped outright.
            Some(end) if end > 0 => rest = &after[end + 1..],
            // "<>" or an unclosed "<" stays literal.
            _ => {
                text.push('<');
                rest = after;
            }
        }
    }
    text.push_str(rest);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode base64url payloads, padded or not.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .map_err(|e| HarvestError::Decode(e.to_string()))
}

/// Make an attachment filename safe to join under the destination folder.
///
/// Path separators and NULs become underscores; everything else is kept
/// so the saved name still matches what the sender attached.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            _ => c,
        })
        .collect();
    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}
