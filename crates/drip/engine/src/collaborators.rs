//! Collaborator traits: the narrow interfaces the engine consumes
//!
//! The engine never owns persistence or transport. It reads workflows
//! and enrollments, writes enrollment transitions and stats, and hands
//! rendered messages to a delivery gateway. Production deployments
//! implement these traits over their own backends; in-memory
//! implementations for development and testing live in [`crate::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drip_types::{
    Contact, ContactId, DeliveryError, DripResult, EmailTemplate, Enrollment, EnrollmentId,
    EnrollmentUpdate, OutboundEmail, TemplateId, Workflow, WorkflowId, WorkflowStats,
};

/// Read access to workflows, plus the stats write-back
#[async_trait]
pub trait WorkflowCatalog: Send + Sync {
    /// All workflows with status Active, in a stable catalog order
    async fn active_workflows(&self) -> DripResult<Vec<Workflow>>;

    /// Persist a recomputed stats rollup onto the workflow record
    async fn record_stats(&self, id: &WorkflowId, stats: &WorkflowStats) -> DripResult<()>;
}

/// Read and write access to enrollments
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Active enrollments of the workflow with `next_send_date <= now`,
    /// capped to `cap` entries
    async fn due_enrollments(
        &self,
        workflow_id: &WorkflowId,
        now: DateTime<Utc>,
        cap: usize,
    ) -> DripResult<Vec<Enrollment>>;

    /// Every enrollment of the workflow, for stats recomputation
    async fn enrollments_for_workflow(&self, workflow_id: &WorkflowId)
        -> DripResult<Vec<Enrollment>>;

    /// Apply one partial update as a single atomic write
    async fn update_enrollment(
        &self,
        id: &EnrollmentId,
        update: &EnrollmentUpdate,
    ) -> DripResult<()>;
}

/// Read access to contacts
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn contact(&self, id: &ContactId) -> DripResult<Option<Contact>>;
}

/// Read access to email templates
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn template(&self, id: &TemplateId) -> DripResult<Option<EmailTemplate>>;
}

/// Outbound email transport
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError>;
}

/// Builds per-contact unsubscribe links for the compliance footer
pub trait UnsubscribeUrlBuilder: Send + Sync {
    fn build_url(&self, email: &str, base_url: &str, workflow_id: &WorkflowId) -> String;
}

/// Default unsubscribe link format: query-string on a fixed path
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryStringUnsubscribe;

impl UnsubscribeUrlBuilder for QueryStringUnsubscribe {
    fn build_url(&self, email: &str, base_url: &str, workflow_id: &WorkflowId) -> String {
        format!(
            "{}/unsubscribe?email={}&workflow={}",
            base_url.trim_end_matches('/'),
            email.replace('@', "%40"),
            workflow_id
        )
    }
}
