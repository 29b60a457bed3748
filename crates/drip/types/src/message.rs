//! Outbound messages handed to the delivery gateway

use crate::{ContactId, EnrollmentId, WorkflowId};
use serde::{Deserialize, Serialize};

/// The result of rendering a template for a contact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// The identity outbound email is sent as
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub from_email: String,
    pub from_name: String,
    pub reply_to: String,
}

impl SenderIdentity {
    pub fn new(from_email: impl Into<String>, from_name: impl Into<String>) -> Self {
        let from_email = from_email.into();
        Self {
            reply_to: from_email.clone(),
            from_email,
            from_name: from_name.into(),
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = reply_to.into();
        self
    }
}

/// Tracing headers attached to every outbound message, so deliveries
/// can be correlated back to the enrollment that produced them
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceHeaders {
    pub workflow_id: WorkflowId,
    pub enrollment_id: EnrollmentId,
    pub contact_id: ContactId,
    /// List-Unsubscribe header value
    pub list_unsubscribe: String,
}

/// A fully rendered message ready for the delivery gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub sender: SenderIdentity,
    pub headers: TraceHeaders,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_identity_defaults_reply_to() {
        let sender = SenderIdentity::new("news@example.com", "Example News");
        assert_eq!(sender.reply_to, "news@example.com");

        let sender = sender.with_reply_to("support@example.com");
        assert_eq!(sender.reply_to, "support@example.com");
    }
}
