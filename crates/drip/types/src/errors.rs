//! Error types for the Drip engine
//!
//! The taxonomy mirrors how errors are handled: configuration errors
//! are fatal to a whole pass, storage errors isolate a workflow, and
//! delivery errors feed the per-enrollment retry policy.

use crate::{ContactId, EnrollmentId, TemplateId, WorkflowId};

/// A delivery gateway failure
#[derive(Clone, Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("recipient rejected: {0}")]
    Rejected(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Errors that can occur in Drip operations
#[derive(Debug, thiserror::Error)]
pub enum DripError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("missing or invalid trigger credential")]
    Unauthorized,

    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("enrollment not found: {0}")]
    EnrollmentNotFound(EnrollmentId),

    #[error("contact not found: {0}")]
    ContactNotFound(ContactId),

    #[error("template not found: {0}")]
    TemplateNotFound(TemplateId),

    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Result type alias for Drip operations
pub type DripResult<T> = Result<T, DripError>;
