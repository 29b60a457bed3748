//! Enrollments: one contact's progress instance through one workflow
//!
//! An enrollment carries its own due date (`next_send_date`), which is
//! what makes batch passes resumable: nothing about progress lives only
//! in memory. Step history is append-only, and the failure count is
//! always derived by scanning it — a stored counter could drift from
//! the history it summarizes.

use crate::{ContactId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifier ───────────────────────────────────────────────────────

/// Unique identifier for an enrollment
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub String);

impl EnrollmentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Enrollment ───────────────────────────────────────────────────────

/// A contact's progress through a workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Enrollment {
    /// Unique identifier
    pub id: EnrollmentId,
    /// The workflow being progressed through
    pub workflow_id: WorkflowId,
    /// The enrolled contact
    pub contact_id: ContactId,
    /// Current status; terminal statuses never transition further
    pub status: EnrollmentStatus,
    /// The step number currently due (or last attempted)
    pub current_step: u32,
    /// When the current step becomes due; set while Active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_send_date: Option<DateTime<Utc>>,
    /// Append-only record of step attempts
    pub step_history: Vec<StepResult>,
    /// Set exactly once, on entering a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    /// When the enrollment was created
    pub created_at: DateTime<Utc>,
    /// When the enrollment was last updated
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Create a new Active enrollment at step 1, due immediately
    pub fn new(workflow_id: WorkflowId, contact_id: ContactId, now: DateTime<Utc>) -> Self {
        Self {
            id: EnrollmentId::generate(),
            workflow_id,
            contact_id,
            status: EnrollmentStatus::Active,
            current_step: 1,
            next_send_date: Some(now),
            step_history: Vec::new(),
            completed_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the enrollment is due for processing
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EnrollmentStatus::Active
            && self.next_send_date.map(|d| d <= now).unwrap_or(false)
    }

    /// Check if the enrollment has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Number of failed step attempts, derived from the full history
    pub fn failure_count(&self) -> u32 {
        self.step_history
            .iter()
            .filter(|r| r.status == StepStatus::Failed)
            .count() as u32
    }

    /// Number of successfully sent steps
    pub fn sent_count(&self) -> u32 {
        self.step_history
            .iter()
            .filter(|r| r.status == StepStatus::Sent)
            .count() as u32
    }
}

// ── Enrollment Status ────────────────────────────────────────────────

/// The lifecycle status of an enrollment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EnrollmentStatus {
    /// Progressing through the sequence
    #[default]
    Active,
    /// Finished the final step (terminal)
    Completed,
    /// Exhausted the failure budget (terminal)
    Failed,
    /// Contact was no longer subscribed at send time (terminal)
    Unsubscribed,
}

impl EnrollmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Completed | EnrollmentStatus::Failed | EnrollmentStatus::Unsubscribed
        )
    }
}

// ── Step Result ──────────────────────────────────────────────────────

/// One attempt at sending a step
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Which step was attempted
    pub step_number: u32,
    /// When the attempt happened
    pub sent_date: DateTime<Utc>,
    /// Whether the delivery succeeded
    pub status: StepStatus,
}

impl StepResult {
    pub fn sent(step_number: u32, sent_date: DateTime<Utc>) -> Self {
        Self {
            step_number,
            sent_date,
            status: StepStatus::Sent,
        }
    }

    pub fn failed(step_number: u32, sent_date: DateTime<Utc>) -> Self {
        Self {
            step_number,
            sent_date,
            status: StepStatus::Failed,
        }
    }
}

/// Outcome of a step attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Sent,
    Failed,
}

// ── Partial Update ───────────────────────────────────────────────────

/// An explicit partial update for an enrollment.
///
/// Every mutable field is enumerated here; there is no free-form field
/// bag. A state transition is expressed as one update and persisted as
/// one store write. `apply` only ever appends to the step history.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EnrollmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EnrollmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    /// Outer None = leave unchanged; inner None = clear the due date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_send_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append_step_result: Option<StepResult>,
}

impl EnrollmentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: EnrollmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_current_step(mut self, step: u32) -> Self {
        self.current_step = Some(step);
        self
    }

    pub fn with_next_send_date(mut self, date: DateTime<Utc>) -> Self {
        self.next_send_date = Some(Some(date));
        self
    }

    pub fn with_completed_date(mut self, date: DateTime<Utc>) -> Self {
        self.completed_date = Some(date);
        self
    }

    pub fn with_step_result(mut self, result: StepResult) -> Self {
        self.append_step_result = Some(result);
        self
    }

    /// True if applying this update would change nothing
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.current_step.is_none()
            && self.next_send_date.is_none()
            && self.completed_date.is_none()
            && self.append_step_result.is_none()
    }

    /// Apply the update to an enrollment in place
    pub fn apply(&self, enrollment: &mut Enrollment) {
        if let Some(status) = self.status {
            enrollment.status = status;
        }
        if let Some(step) = self.current_step {
            enrollment.current_step = step;
        }
        if let Some(next) = self.next_send_date {
            enrollment.next_send_date = next;
        }
        if let Some(done) = self.completed_date {
            enrollment.completed_date = Some(done);
        }
        if let Some(result) = &self.append_step_result {
            enrollment.step_history.push(result.clone());
        }
        enrollment.updated_at = Utc::now();
    }
}
