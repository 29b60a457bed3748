//! Batch pass summaries returned to the invocation trigger

use serde::{Deserialize, Serialize};

/// Counts accumulated over one batch pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Enrollments the state machine looked at
    pub processed: u64,
    /// Deliveries that succeeded
    pub sent: u64,
    /// Attempts that failed (retrying or failed out)
    pub failed: u64,
    /// Collaborator failures that cut part of the pass short
    pub errors: u64,
}

impl PassSummary {
    pub fn merge(&mut self, other: PassSummary) {
        self.processed += other.processed;
        self.sent += other.sent;
        self.failed += other.failed;
        self.errors += other.errors;
    }
}

/// The response handed back to the periodic caller
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassResponse {
    /// False when a collaborator failure cut part of the pass short,
    /// so an outage is distinguishable from a genuinely quiet pass
    pub success: bool,
    pub processed: u64,
    pub sent: u64,
    pub failed: u64,
    pub errors: u64,
    pub execution_time_ms: u64,
}

impl PassResponse {
    pub fn from_summary(summary: PassSummary, execution_time_ms: u64) -> Self {
        Self {
            success: summary.errors == 0,
            processed: summary.processed,
            sent: summary.sent,
            failed: summary.failed,
            errors: summary.errors,
            execution_time_ms,
        }
    }
}
