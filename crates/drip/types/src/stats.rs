//! Workflow statistics: a derived rollup over the enrollment set
//!
//! Stats are recomputed from scratch after each processed batch, never
//! incrementally maintained. Recomputation guarantees consistency with
//! the enrollment set at the time it runs.

use crate::{Enrollment, EnrollmentStatus};
use serde::{Deserialize, Serialize};

/// Aggregate counters persisted onto the workflow record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub total_enrolled: u64,
    pub total_completed: u64,
    /// Rounded percentage, formatted `"<n>%"`
    pub completion_rate: String,
    pub total_emails_sent: u64,
}

impl Default for WorkflowStats {
    fn default() -> Self {
        Self {
            total_enrolled: 0,
            total_completed: 0,
            completion_rate: "0%".to_string(),
            total_emails_sent: 0,
        }
    }
}

impl WorkflowStats {
    /// Compute the rollup for a workflow's full enrollment set
    pub fn compute(enrollments: &[Enrollment]) -> Self {
        let total_enrolled = enrollments.len() as u64;
        let total_completed = enrollments
            .iter()
            .filter(|e| e.status == EnrollmentStatus::Completed)
            .count() as u64;
        let total_emails_sent = enrollments.iter().map(|e| e.sent_count() as u64).sum();

        let completion_rate = if total_enrolled == 0 {
            "0%".to_string()
        } else {
            let rate = (total_completed as f64 / total_enrolled as f64 * 100.0).round();
            format!("{}%", rate as u64)
        };

        Self {
            total_enrolled,
            total_completed,
            completion_rate,
            total_emails_sent,
        }
    }
}
