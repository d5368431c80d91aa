//! Mail service abstraction: the capability set the pipeline consumes.
//!
//! Token acquisition, session state, and the wire protocol all live behind
//! this seam; the pipeline only ever sees ids, messages, and payloads.

pub mod memory;

use crate::error::Result;
use crate::model::message::{Message, MessageRef};

/// Payload returned by an out-of-line attachment fetch.
#[derive(Debug, Clone)]
pub struct AttachmentData {
    /// Base64url-encoded bytes.
    pub data: String,
}

/// A mailbox backend.
///
/// Calls are synchronous and blocking. Implementations surface failures
/// as [`crate::error::HarvestError::Transport`]; the pipeline decides
/// what a failure means at query, message, or attachment granularity.
pub trait MailService {
    /// Ids of messages matching `query`. An empty query matches
    /// everything; an error here is a query-level failure.
    fn list_messages(&self, query: &str) -> Result<Vec<MessageRef>>;

    /// Fetch the full message for an id.
    fn get_message(&self, id: &str) -> Result<Message>;

    /// Fetch an out-of-line attachment payload.
    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<AttachmentData>;
}
