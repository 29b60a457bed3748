//! In-memory implementations of the collaborator traits
//!
//! These are suitable for development and testing. Production
//! deployments should use persistent backends that implement the same
//! traits.

use crate::collaborators::{
    ContactDirectory, DeliveryGateway, EnrollmentStore, TemplateStore, WorkflowCatalog,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use drip_types::{
    Contact, ContactId, DeliveryError, DripError, DripResult, EmailTemplate, Enrollment,
    EnrollmentId, EnrollmentUpdate, OutboundEmail, TemplateId, Workflow, WorkflowId,
    WorkflowStats,
};
use std::sync::Mutex;

// ── Workflow catalog ─────────────────────────────────────────────────

/// In-memory workflow catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    workflows: DashMap<WorkflowId, Workflow>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, workflow: Workflow) {
        self.workflows.insert(workflow.id.clone(), workflow);
    }

    pub fn workflow(&self, id: &WorkflowId) -> Option<Workflow> {
        self.workflows.get(id).map(|w| w.clone())
    }
}

#[async_trait]
impl WorkflowCatalog for InMemoryCatalog {
    async fn active_workflows(&self) -> DripResult<Vec<Workflow>> {
        let mut active: Vec<Workflow> = self
            .workflows
            .iter()
            .filter(|w| w.status.is_active())
            .map(|w| w.clone())
            .collect();
        // Stable catalog order: by name, then id for ties
        active.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(active)
    }

    async fn record_stats(&self, id: &WorkflowId, stats: &WorkflowStats) -> DripResult<()> {
        let mut workflow = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| DripError::WorkflowNotFound(id.clone()))?;
        workflow.stats = stats.clone();
        workflow.updated_at = Utc::now();
        Ok(())
    }
}

// ── Enrollment store ─────────────────────────────────────────────────

/// In-memory enrollment store
#[derive(Debug, Default)]
pub struct InMemoryEnrollmentStore {
    enrollments: DashMap<EnrollmentId, Enrollment>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, enrollment: Enrollment) {
        self.enrollments.insert(enrollment.id.clone(), enrollment);
    }

    pub fn enrollment(&self, id: &EnrollmentId) -> Option<Enrollment> {
        self.enrollments.get(id).map(|e| e.clone())
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn due_enrollments(
        &self,
        workflow_id: &WorkflowId,
        now: DateTime<Utc>,
        cap: usize,
    ) -> DripResult<Vec<Enrollment>> {
        let mut due: Vec<Enrollment> = self
            .enrollments
            .iter()
            .filter(|e| e.workflow_id == *workflow_id && e.is_due(now))
            .map(|e| e.clone())
            .collect();
        // Oldest due first, id as tiebreak for determinism
        due.sort_by(|a, b| {
            a.next_send_date
                .cmp(&b.next_send_date)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        due.truncate(cap);
        Ok(due)
    }

    async fn enrollments_for_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> DripResult<Vec<Enrollment>> {
        Ok(self
            .enrollments
            .iter()
            .filter(|e| e.workflow_id == *workflow_id)
            .map(|e| e.clone())
            .collect())
    }

    async fn update_enrollment(
        &self,
        id: &EnrollmentId,
        update: &EnrollmentUpdate,
    ) -> DripResult<()> {
        let mut enrollment = self
            .enrollments
            .get_mut(id)
            .ok_or_else(|| DripError::EnrollmentNotFound(id.clone()))?;
        update.apply(&mut enrollment);
        Ok(())
    }
}

// ── Contact directory ────────────────────────────────────────────────

/// In-memory contact directory
#[derive(Debug, Default)]
pub struct InMemoryContactDirectory {
    contacts: DashMap<ContactId, Contact>,
}

impl InMemoryContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contact: Contact) {
        self.contacts.insert(contact.id.clone(), contact);
    }
}

#[async_trait]
impl ContactDirectory for InMemoryContactDirectory {
    async fn contact(&self, id: &ContactId) -> DripResult<Option<Contact>> {
        Ok(self.contacts.get(id).map(|c| c.clone()))
    }
}

// ── Template store ───────────────────────────────────────────────────

/// In-memory template store
#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    templates: DashMap<TemplateId, EmailTemplate>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, template: EmailTemplate) {
        self.templates.insert(template.id.clone(), template);
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn template(&self, id: &TemplateId) -> DripResult<Option<EmailTemplate>> {
        Ok(self.templates.get(id).map(|t| t.clone()))
    }
}

// ── Delivery gateway ─────────────────────────────────────────────────

/// A delivery gateway that records sends and can be scripted to reject
/// specific recipients
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<OutboundEmail>>,
    rejections: DashMap<String, String>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `recipient` fail with the given reason
    pub fn reject(&self, recipient: impl Into<String>, reason: impl Into<String>) {
        self.rejections.insert(recipient.into(), reason.into());
    }

    /// Let sends to `recipient` succeed again
    pub fn accept(&self, recipient: &str) {
        self.rejections.remove(recipient);
    }

    /// Successfully delivered messages, in send order
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("gateway lock").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("gateway lock").len()
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        if let Some(reason) = self.rejections.get(&email.to) {
            return Err(DeliveryError::Rejected(reason.value().clone()));
        }
        self.sent.lock().expect("gateway lock").push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use drip_types::{Step, WorkflowStatus};

    #[tokio::test]
    async fn test_active_workflows_ordering_and_filter() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(Workflow::new("Beta").with_status(WorkflowStatus::Active));
        catalog.insert(Workflow::new("Alpha").with_status(WorkflowStatus::Active));
        catalog.insert(Workflow::new("Drafted")); // Draft, filtered out
        catalog.insert(Workflow::new("Paused").with_status(WorkflowStatus::Paused));

        let active = catalog.active_workflows().await.unwrap();
        let names: Vec<&str> = active.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn test_record_stats_unknown_workflow() {
        let catalog = InMemoryCatalog::new();
        let err = catalog
            .record_stats(&WorkflowId::new("nope"), &WorkflowStats::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DripError::WorkflowNotFound(_)));
    }

    #[tokio::test]
    async fn test_due_enrollments_filter_cap_order() {
        let store = InMemoryEnrollmentStore::new();
        let wf = WorkflowId::new("wf-1");
        let now = Utc::now();

        let mut early = Enrollment::new(wf.clone(), ContactId::new("c1"), now);
        early.next_send_date = Some(now - Duration::hours(2));
        let mut late = Enrollment::new(wf.clone(), ContactId::new("c2"), now);
        late.next_send_date = Some(now - Duration::hours(1));
        let mut future = Enrollment::new(wf.clone(), ContactId::new("c3"), now);
        future.next_send_date = Some(now + Duration::hours(1));
        let other = Enrollment::new(WorkflowId::new("wf-2"), ContactId::new("c4"), now);

        let early_id = early.id.clone();
        store.insert(early);
        store.insert(late);
        store.insert(future);
        store.insert(other);

        let due = store.due_enrollments(&wf, now, 10).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, early_id);

        let capped = store.due_enrollments(&wf, now, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, early_id);
    }

    #[tokio::test]
    async fn test_update_enrollment_not_found() {
        let store = InMemoryEnrollmentStore::new();
        let err = store
            .update_enrollment(&EnrollmentId::new("nope"), &EnrollmentUpdate::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DripError::EnrollmentNotFound(_)));
    }

    #[tokio::test]
    async fn test_recording_gateway_rejection() {
        let gateway = RecordingGateway::new();
        gateway.reject("bad@example.com", "bounced");

        let workflow = Workflow::new("W")
            .with_step(Step::new(1, TemplateId::new("t")))
            .unwrap();
        let enrollment =
            Enrollment::new(workflow.id.clone(), ContactId::new("c"), Utc::now());
        let email = OutboundEmail {
            to: "bad@example.com".into(),
            subject: "s".into(),
            html: "b".into(),
            sender: drip_types::SenderIdentity::new("from@example.com", "From"),
            headers: drip_types::TraceHeaders {
                workflow_id: workflow.id.clone(),
                enrollment_id: enrollment.id.clone(),
                contact_id: enrollment.contact_id.clone(),
                list_unsubscribe: "<https://x/u>".into(),
            },
        };

        assert!(gateway.send(&email).await.is_err());
        assert_eq!(gateway.sent_count(), 0);

        gateway.accept("bad@example.com");
        assert!(gateway.send(&email).await.is_ok());
        assert_eq!(gateway.sent_count(), 1);
    }
}
