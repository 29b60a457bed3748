//! Email templates: the content a step sends
//!
//! Templates use `{{first_name}}` and `{{last_name}}` placeholders in
//! both subject and body. Substitution is performed by the renderer.

use serde::{Deserialize, Serialize};

/// Unique identifier for an email template
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl TemplateId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An email template referenced by workflow steps
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: TemplateId,
    pub name: String,
    pub subject: String,
    pub html_body: String,
}

impl EmailTemplate {
    pub fn new(
        name: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Self {
        Self {
            id: TemplateId::generate(),
            name: name.into(),
            subject: subject.into(),
            html_body: html_body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_construction() {
        let t = EmailTemplate::new("welcome", "Hi {{first_name}}", "<p>Hello</p>");
        assert_eq!(t.name, "welcome");
        assert!(t.subject.contains("{{first_name}}"));
    }
}
