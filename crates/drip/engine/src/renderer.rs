//! Content renderer: pure template substitution plus compliance footer
//!
//! Deterministic given identical inputs; no I/O. Substitutes
//! `{{first_name}}` and `{{last_name}}` in both subject and body using
//! an all-occurrences replace, then appends a fixed-format footer
//! naming the workflow and embedding the unsubscribe link.

use drip_types::{Contact, EmailTemplate, RenderedEmail, Workflow};

/// Fallback used when a contact has no first name
const FIRST_NAME_FALLBACK: &str = "there";

/// Render a template for one contact in one workflow
pub fn render(
    template: &EmailTemplate,
    contact: &Contact,
    workflow: &Workflow,
    unsubscribe_url: &str,
) -> RenderedEmail {
    let first_name = if contact.first_name.is_empty() {
        FIRST_NAME_FALLBACK
    } else {
        contact.first_name.as_str()
    };
    let last_name = contact.last_name.as_str();

    let subject = substitute(&template.subject, first_name, last_name);
    let mut html = substitute(&template.html_body, first_name, last_name);
    html.push_str(&compliance_footer(workflow, unsubscribe_url));

    RenderedEmail { subject, html }
}

fn substitute(input: &str, first_name: &str, last_name: &str) -> String {
    input
        .replace("{{first_name}}", first_name)
        .replace("{{last_name}}", last_name)
}

fn compliance_footer(workflow: &Workflow, unsubscribe_url: &str) -> String {
    format!(
        "\n<hr>\n<p style=\"font-size:12px;color:#888888\">\
         You are receiving this email because you are enrolled in the \
         \"{}\" sequence.<br>\n\
         <a href=\"{}\">Unsubscribe</a></p>",
        workflow.name, unsubscribe_url
    )
}
