//! Enrollment state machine: transition logic for one due enrollment
//!
//! Given one due enrollment, its workflow, and the current time, the
//! state machine resolves the step, contact, and template, attempts
//! delivery, and produces exactly one [`EnrollmentUpdate`] describing
//! the transition. It does NOT persist — the caller writes the update
//! as a single atomic store call, so a transition is never half-applied.
//!
//! Failure policy: every failed attempt (delivery failure or a missing
//! contact/template) appends a Failed step result. Once the history
//! holds three failures the enrollment is terminal; otherwise a fixed
//! one-hour backoff reschedules it.

use crate::collaborators::{
    ContactDirectory, DeliveryGateway, TemplateStore, UnsubscribeUrlBuilder,
};
use crate::renderer;
use chrono::{DateTime, Duration, Utc};
use drip_types::{
    DripResult, Enrollment, EnrollmentStatus, EnrollmentUpdate, OutboundEmail, SenderIdentity,
    StepResult, TraceHeaders, Workflow,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Failed attempts (counted across the full history) before an
/// enrollment is marked Failed
pub const MAX_STEP_FAILURES: u32 = 3;

/// Fixed backoff applied after a non-terminal failure
pub const RETRY_BACKOFF_SECS: i64 = 3_600;

/// Per-enrollment transition logic
pub struct StateMachine {
    contacts: Arc<dyn ContactDirectory>,
    templates: Arc<dyn TemplateStore>,
    gateway: Arc<dyn DeliveryGateway>,
    unsubscribe: Arc<dyn UnsubscribeUrlBuilder>,
    sender: SenderIdentity,
    unsubscribe_base_url: String,
}

/// One computed transition: the update to persist plus what happened
#[derive(Clone, Debug)]
pub struct Transition {
    pub update: EnrollmentUpdate,
    pub outcome: TransitionOutcome,
}

impl Transition {
    fn stalled(reason: StallReason) -> Self {
        Self {
            update: EnrollmentUpdate::new(),
            outcome: TransitionOutcome::Stalled(reason),
        }
    }
}

/// What the state machine decided for an enrollment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Delivery succeeded; the enrollment advanced or completed
    Sent { workflow_completed: bool },
    /// Attempt failed; rescheduled with backoff
    Retrying { failures: u32 },
    /// Attempt failed and exhausted the failure budget
    FailedOut,
    /// Contact no longer subscribed; nothing was sent
    Unsubscribed,
    /// No transition possible; requires operator intervention
    Stalled(StallReason),
}

/// Why an enrollment could not transition.
///
/// A stalled enrollment keeps its due date and is re-selected every
/// pass until an operator reactivates or removes the step. There is
/// deliberately no auto-skip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StallReason {
    /// `current_step` names no step of the workflow
    StepMissing,
    /// The step exists but is deactivated
    StepInactive,
}

impl StateMachine {
    pub fn new(
        contacts: Arc<dyn ContactDirectory>,
        templates: Arc<dyn TemplateStore>,
        gateway: Arc<dyn DeliveryGateway>,
        unsubscribe: Arc<dyn UnsubscribeUrlBuilder>,
        sender: SenderIdentity,
        unsubscribe_base_url: impl Into<String>,
    ) -> Self {
        Self {
            contacts,
            templates,
            gateway,
            unsubscribe,
            sender,
            unsubscribe_base_url: unsubscribe_base_url.into(),
        }
    }

    /// Compute the transition for one due enrollment.
    ///
    /// Returns `Err` only for collaborator lookup failures (storage
    /// errors); every resolvable situation, including delivery failure,
    /// is expressed as a [`TransitionOutcome`].
    pub async fn process(
        &self,
        enrollment: &Enrollment,
        workflow: &Workflow,
        now: DateTime<Utc>,
    ) -> DripResult<Transition> {
        let step = match workflow.step(enrollment.current_step) {
            Some(step) => step,
            None => {
                warn!(
                    enrollment_id = %enrollment.id,
                    workflow_id = %workflow.id,
                    step = enrollment.current_step,
                    "enrollment stalled: current step does not exist"
                );
                return Ok(Transition::stalled(StallReason::StepMissing));
            }
        };
        if !step.active {
            warn!(
                enrollment_id = %enrollment.id,
                workflow_id = %workflow.id,
                step = step.step_number,
                "enrollment stalled: current step is inactive"
            );
            return Ok(Transition::stalled(StallReason::StepInactive));
        }

        let contact = match self.contacts.contact(&enrollment.contact_id).await? {
            Some(contact) => contact,
            None => {
                // Folded into the failure budget, same as a delivery failure
                return Ok(self.record_failure(enrollment, now, "contact missing"));
            }
        };

        if !contact.status.is_active() {
            debug!(
                enrollment_id = %enrollment.id,
                contact_id = %contact.id,
                "contact no longer subscribed; closing enrollment"
            );
            return Ok(Transition {
                update: EnrollmentUpdate::new()
                    .with_status(EnrollmentStatus::Unsubscribed)
                    .with_completed_date(now),
                outcome: TransitionOutcome::Unsubscribed,
            });
        }

        let template = match self.templates.template(&step.template_id).await? {
            Some(template) => template,
            None => {
                return Ok(self.record_failure(enrollment, now, "template missing"));
            }
        };

        let unsubscribe_url =
            self.unsubscribe
                .build_url(&contact.email, &self.unsubscribe_base_url, &workflow.id);
        let rendered = renderer::render(&template, &contact, workflow, &unsubscribe_url);

        let email = OutboundEmail {
            to: contact.email.clone(),
            subject: rendered.subject,
            html: rendered.html,
            sender: self.sender.clone(),
            headers: TraceHeaders {
                workflow_id: workflow.id.clone(),
                enrollment_id: enrollment.id.clone(),
                contact_id: contact.id.clone(),
                list_unsubscribe: format!("<{}>", unsubscribe_url),
            },
        };

        match self.gateway.send(&email).await {
            Ok(()) => Ok(self.advance(enrollment, workflow, now)),
            Err(err) => {
                warn!(
                    enrollment_id = %enrollment.id,
                    step = enrollment.current_step,
                    error = %err,
                    "delivery failed"
                );
                Ok(self.record_failure(enrollment, now, &err.to_string()))
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Successful delivery: record the send, then complete or advance
    fn advance(&self, enrollment: &Enrollment, workflow: &Workflow, now: DateTime<Utc>) -> Transition {
        let update = EnrollmentUpdate::new()
            .with_step_result(StepResult::sent(enrollment.current_step, now));

        if Some(enrollment.current_step) == workflow.last_step_number() {
            return Transition {
                update: update
                    .with_status(EnrollmentStatus::Completed)
                    .with_completed_date(now),
                outcome: TransitionOutcome::Sent {
                    workflow_completed: true,
                },
            };
        }

        // Delays compound from the actual send time, and come from the
        // step being advanced to. A sparse gap gets zero delay; the
        // enrollment then surfaces as stalled on the next pass instead
        // of being silently skipped ahead.
        let next_step = enrollment.current_step + 1;
        let delay = workflow
            .step(next_step)
            .map(|s| s.delay())
            .unwrap_or_else(Duration::zero);

        Transition {
            update: update
                .with_current_step(next_step)
                .with_next_send_date(now + delay),
            outcome: TransitionOutcome::Sent {
                workflow_completed: false,
            },
        }
    }

    /// Failed attempt: append to history, then fail out or back off
    fn record_failure(&self, enrollment: &Enrollment, now: DateTime<Utc>, reason: &str) -> Transition {
        let failures = enrollment.failure_count() + 1;
        let update = EnrollmentUpdate::new()
            .with_step_result(StepResult::failed(enrollment.current_step, now));

        if failures >= MAX_STEP_FAILURES {
            warn!(
                enrollment_id = %enrollment.id,
                failures,
                reason,
                "failure budget exhausted; enrollment failed"
            );
            // current_step and next_send_date stay as-is; terminal
            return Transition {
                update: update
                    .with_status(EnrollmentStatus::Failed)
                    .with_completed_date(now),
                outcome: TransitionOutcome::FailedOut,
            };
        }

        Transition {
            update: update.with_next_send_date(now + Duration::seconds(RETRY_BACKOFF_SECS)),
            outcome: TransitionOutcome::Retrying { failures },
        }
    }
}
