//! Contacts: the recipients progressing through workflows

use serde::{Deserialize, Serialize};

/// Unique identifier for a contact
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(pub String);

impl ContactId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A contact as seen by the enrollment engine.
///
/// Empty name fields mean the value is unknown; the renderer supplies
/// fallbacks at substitution time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub status: ContactStatus,
}

impl Contact {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: ContactId::generate(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            status: ContactStatus::Active,
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    pub fn with_status(mut self, status: ContactStatus) -> Self {
        self.status = status;
        self
    }
}

/// Subscription status of a contact
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ContactStatus {
    /// May receive workflow emails
    #[default]
    Active,
    /// Opted out
    Unsubscribed,
    /// Address is undeliverable
    Bounced,
}

impl ContactStatus {
    pub fn is_active(&self) -> bool {
        *self == ContactStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_builder() {
        let contact = Contact::new("ada@example.com").with_name("Ada", "Lovelace");
        assert_eq!(contact.email, "ada@example.com");
        assert_eq!(contact.first_name, "Ada");
        assert!(contact.status.is_active());
    }

    #[test]
    fn test_non_active_statuses() {
        assert!(!ContactStatus::Unsubscribed.is_active());
        assert!(!ContactStatus::Bounced.is_active());
    }
}
