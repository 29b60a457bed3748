//! Stats aggregator: recomputes workflow rollups after a batch
//!
//! Stats are a best-effort derived projection, never the source of
//! truth. A persistence failure is logged and swallowed so it can
//! never roll back or block already-committed enrollment transitions.

use crate::collaborators::{EnrollmentStore, WorkflowCatalog};
use drip_types::{DripResult, WorkflowId, WorkflowStats};
use std::sync::Arc;
use tracing::{debug, warn};

/// Recomputes and persists per-workflow statistics
pub struct StatsAggregator {
    enrollments: Arc<dyn EnrollmentStore>,
    catalog: Arc<dyn WorkflowCatalog>,
}

impl StatsAggregator {
    pub fn new(enrollments: Arc<dyn EnrollmentStore>, catalog: Arc<dyn WorkflowCatalog>) -> Self {
        Self {
            enrollments,
            catalog,
        }
    }

    /// Recompute the rollup from the full enrollment set and persist it
    /// onto the workflow record
    pub async fn recompute(&self, workflow_id: &WorkflowId) -> DripResult<WorkflowStats> {
        let enrollments = self.enrollments.enrollments_for_workflow(workflow_id).await?;
        let stats = WorkflowStats::compute(&enrollments);

        debug!(
            workflow_id = %workflow_id,
            enrolled = stats.total_enrolled,
            completed = stats.total_completed,
            sent = stats.total_emails_sent,
            "recomputed workflow stats"
        );

        if let Err(err) = self.catalog.record_stats(workflow_id, &stats).await {
            warn!(
                workflow_id = %workflow_id,
                error = %err,
                "failed to persist workflow stats; continuing"
            );
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryCatalog, InMemoryEnrollmentStore};
    use chrono::Utc;
    use drip_types::{
        ContactId, Enrollment, EnrollmentStatus, StepResult, Workflow, WorkflowStatus,
    };

    #[tokio::test]
    async fn test_recompute_persists_onto_workflow() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let store = Arc::new(InMemoryEnrollmentStore::new());
        let workflow = Workflow::new("W").with_status(WorkflowStatus::Active);
        let wf_id = workflow.id.clone();
        catalog.insert(workflow);

        let now = Utc::now();
        let mut done = Enrollment::new(wf_id.clone(), ContactId::new("c1"), now);
        done.status = EnrollmentStatus::Completed;
        done.step_history.push(StepResult::sent(1, now));
        done.step_history.push(StepResult::sent(2, now));
        store.insert(done);
        store.insert(Enrollment::new(wf_id.clone(), ContactId::new("c2"), now));

        let aggregator = StatsAggregator::new(store, catalog.clone());
        let stats = aggregator.recompute(&wf_id).await.unwrap();

        assert_eq!(stats.total_enrolled, 2);
        assert_eq!(stats.total_completed, 1);
        assert_eq!(stats.completion_rate, "50%");
        assert_eq!(stats.total_emails_sent, 2);

        let persisted = catalog.workflow(&wf_id).unwrap();
        assert_eq!(persisted.stats, stats);
    }

    #[tokio::test]
    async fn test_persist_failure_is_swallowed() {
        // Catalog has no such workflow, so record_stats fails; the
        // recompute still returns the stats.
        let catalog = Arc::new(InMemoryCatalog::new());
        let store = Arc::new(InMemoryEnrollmentStore::new());
        let aggregator = StatsAggregator::new(store, catalog);

        let stats = aggregator
            .recompute(&WorkflowId::new("missing"))
            .await
            .unwrap();
        assert_eq!(stats.total_enrolled, 0);
        assert_eq!(stats.completion_rate, "0%");
    }
}
