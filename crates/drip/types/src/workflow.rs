//! Workflow definitions: ordered sequences of timed email steps
//!
//! A workflow pairs each step with a template and a relative delay.
//! Delays are measured from the moment the previous step actually sent,
//! not from the original enrollment time, so they compound.

use crate::{DripError, DripResult, TemplateId, WorkflowStats};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ── Identifier ───────────────────────────────────────────────────────

/// Unique identifier for a workflow
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
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

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

/// A workflow — a named, ordered email sequence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier
    pub id: WorkflowId,
    /// Human-readable name (also shown in the compliance footer)
    pub name: String,
    /// Lifecycle status; only Active workflows are processed
    pub status: WorkflowStatus,
    /// Steps ordered by ascending step number
    pub steps: Vec<Step>,
    /// Derived rollup, recomputed after each processed batch
    #[serde(default)]
    pub stats: WorkflowStats,
    /// When the workflow was created
    pub created_at: DateTime<Utc>,
    /// When the workflow was last updated
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new workflow in Draft status with no steps
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::generate(),
            name: name.into(),
            status: WorkflowStatus::Draft,
            steps: Vec::new(),
            stats: WorkflowStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    /// Append a step, enforcing ascending unique step numbers.
    ///
    /// The first step must be step 1; later steps must be strictly
    /// greater than every step already present (gaps are allowed).
    pub fn add_step(&mut self, step: Step) -> DripResult<()> {
        if step.step_number == 0 {
            return Err(DripError::InvalidWorkflow(
                "step numbers start at 1".into(),
            ));
        }
        match self.steps.last() {
            None if step.step_number != 1 => {
                return Err(DripError::InvalidWorkflow(format!(
                    "first step must be step 1, got {}",
                    step.step_number
                )));
            }
            Some(last) if step.step_number <= last.step_number => {
                return Err(DripError::InvalidWorkflow(format!(
                    "step {} does not follow step {}",
                    step.step_number, last.step_number
                )));
            }
            _ => {}
        }
        self.steps.push(step);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Builder form of [`add_step`](Self::add_step)
    pub fn with_step(mut self, step: Step) -> DripResult<Self> {
        self.add_step(step)?;
        Ok(self)
    }

    /// Look up a step by its step number
    pub fn step(&self, step_number: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_number == step_number)
    }

    /// The highest step number, i.e. the last step of the sequence
    pub fn last_step_number(&self) -> Option<u32> {
        self.steps.iter().map(|s| s.step_number).max()
    }

    /// Check that the step sequence is well-formed
    pub fn validate(&self) -> DripResult<()> {
        let mut previous: Option<u32> = None;
        for step in &self.steps {
            if step.step_number == 0 {
                return Err(DripError::InvalidWorkflow(
                    "step numbers start at 1".into(),
                ));
            }
            match previous {
                None if step.step_number != 1 => {
                    return Err(DripError::InvalidWorkflow(
                        "first step must be step 1".into(),
                    ));
                }
                Some(prev) if step.step_number <= prev => {
                    return Err(DripError::InvalidWorkflow(format!(
                        "step numbers not strictly ascending at {}",
                        step.step_number
                    )));
                }
                _ => {}
            }
            previous = Some(step.step_number);
        }
        Ok(())
    }
}

// ── Workflow Status ──────────────────────────────────────────────────

/// The lifecycle status of a workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WorkflowStatus {
    /// Being edited, not yet runnable
    #[default]
    Draft,
    /// Eligible for batch processing
    Active,
    /// Temporarily suspended; enrollments keep their due dates
    Paused,
    /// Closed to processing
    Completed,
}

impl WorkflowStatus {
    pub fn is_active(&self) -> bool {
        *self == WorkflowStatus::Active
    }
}

// ── Step ─────────────────────────────────────────────────────────────

/// One (template, delay) unit within a workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    /// Position in the sequence; positive, unique, ascending
    pub step_number: u32,
    /// The email template this step sends
    pub template_id: TemplateId,
    /// Days component of the delay before this step becomes due
    pub delay_days: u32,
    /// Hours component of the delay
    pub delay_hours: u32,
    /// Minutes component of the delay
    pub delay_minutes: u32,
    /// Inactive steps are not sent; enrollments pointing at one stall
    /// until an operator intervenes
    pub active: bool,
}

impl Step {
    pub fn new(step_number: u32, template_id: TemplateId) -> Self {
        Self {
            step_number,
            template_id,
            delay_days: 0,
            delay_hours: 0,
            delay_minutes: 0,
            active: true,
        }
    }

    pub fn with_delay(mut self, days: u32, hours: u32, minutes: u32) -> Self {
        self.delay_days = days;
        self.delay_hours = hours;
        self.delay_minutes = minutes;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Total delay in seconds
    pub fn delay_secs(&self) -> i64 {
        self.delay_days as i64 * 86_400
            + self.delay_hours as i64 * 3_600
            + self.delay_minutes as i64 * 60
    }

    /// The wait before this step becomes due, measured from the moment
    /// the previous step sent
    pub fn delay(&self) -> Duration {
        Duration::seconds(self.delay_secs())
    }
}
