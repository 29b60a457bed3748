//! Batch scheduler: one budgeted pass across all active workflows
//!
//! A pass is logically single-threaded: workflows are visited one at a
//! time, and within a workflow enrollments are processed one at a time,
//! so no two writes can race on the same enrollment record. The
//! wall-clock budget is checked once per workflow boundary — a pass may
//! overrun by at most one workflow's capped batch, which is the
//! accepted trade for simple budget accounting. Workflows left
//! unvisited are simply picked up by the next invocation, because
//! due-ness is persisted on each enrollment rather than tracked here.

use crate::collaborators::{EnrollmentStore, WorkflowCatalog};
use crate::lease::LeaseTable;
use crate::state_machine::{StateMachine, TransitionOutcome};
use crate::stats::StatsAggregator;
use chrono::{DateTime, Utc};
use drip_types::{DripResult, Enrollment, PassSummary, Workflow};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default wall-clock budget for one pass
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(50);

/// Default cap on enrollments processed per workflow per pass
pub const DEFAULT_BATCH_CAP: usize = 100;

/// Tunables for a pass
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Wall-clock ceiling, checked at workflow boundaries
    pub time_budget: Duration,
    /// Per-workflow enrollment cap per pass
    pub batch_cap: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_budget: DEFAULT_TIME_BUDGET,
            batch_cap: DEFAULT_BATCH_CAP,
        }
    }
}

/// Orchestrates one processing pass over all active workflows
pub struct BatchScheduler {
    catalog: Arc<dyn WorkflowCatalog>,
    enrollments: Arc<dyn EnrollmentStore>,
    machine: StateMachine,
    stats: StatsAggregator,
    leases: LeaseTable,
    config: SchedulerConfig,
}

impl BatchScheduler {
    pub fn new(
        catalog: Arc<dyn WorkflowCatalog>,
        enrollments: Arc<dyn EnrollmentStore>,
        machine: StateMachine,
        stats: StatsAggregator,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            catalog,
            enrollments,
            machine,
            stats,
            leases: LeaseTable::new(),
            config,
        }
    }

    /// Run one pass. Never fails for per-workflow or per-enrollment
    /// errors; those are logged, counted on the summary, and isolated.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> PassSummary {
        let started = Instant::now();
        let mut summary = PassSummary::default();

        self.leases.purge_expired(now);

        let workflows = match self.catalog.active_workflows().await {
            Ok(workflows) => workflows,
            Err(err) => {
                error!(error = %err, "could not fetch active workflows; pass aborted");
                summary.errors += 1;
                return summary;
            }
        };

        let total = workflows.len();
        for (visited, workflow) in workflows.iter().enumerate() {
            if started.elapsed() >= self.config.time_budget {
                info!(
                    visited,
                    deferred = total - visited,
                    "time budget exhausted; remaining workflows deferred to next pass"
                );
                break;
            }

            match self.process_workflow(workflow, now).await {
                Ok(batch) => summary.merge(batch),
                Err(err) => {
                    // Isolation: one broken workflow never aborts the pass
                    summary.errors += 1;
                    error!(
                        workflow_id = %workflow.id,
                        error = %err,
                        "workflow batch failed; continuing with next workflow"
                    );
                }
            }
        }

        info!(
            processed = summary.processed,
            sent = summary.sent,
            failed = summary.failed,
            errors = summary.errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pass finished"
        );
        summary
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn process_workflow(
        &self,
        workflow: &Workflow,
        now: DateTime<Utc>,
    ) -> DripResult<PassSummary> {
        let due = self
            .enrollments
            .due_enrollments(&workflow.id, now, self.config.batch_cap)
            .await?;

        let mut batch = PassSummary::default();
        for enrollment in &due {
            if !self.leases.claim(&enrollment.id, now) {
                debug!(
                    enrollment_id = %enrollment.id,
                    "enrollment is claimed by another pass; skipping"
                );
                continue;
            }

            let result = self.process_enrollment(enrollment, workflow, now).await;
            self.leases.release(&enrollment.id);

            match result {
                Ok(outcome) => {
                    batch.processed += 1;
                    match outcome {
                        TransitionOutcome::Sent { .. } => batch.sent += 1,
                        TransitionOutcome::Retrying { .. } | TransitionOutcome::FailedOut => {
                            batch.failed += 1
                        }
                        TransitionOutcome::Unsubscribed | TransitionOutcome::Stalled(_) => {}
                    }
                }
                // A store error abandons the rest of this workflow's
                // batch, but the counts already accumulated (transitions
                // that really persisted) survive on the summary.
                Err(err) => {
                    batch.errors += 1;
                    error!(
                        workflow_id = %workflow.id,
                        enrollment_id = %enrollment.id,
                        error = %err,
                        "transition write failed; abandoning the rest of this workflow's batch"
                    );
                    break;
                }
            }
        }

        if batch.processed > 0 {
            if let Err(err) = self.stats.recompute(&workflow.id).await {
                warn!(
                    workflow_id = %workflow.id,
                    error = %err,
                    "stats recomputation failed"
                );
            }
        }

        Ok(batch)
    }

    async fn process_enrollment(
        &self,
        enrollment: &Enrollment,
        workflow: &Workflow,
        now: DateTime<Utc>,
    ) -> DripResult<TransitionOutcome> {
        let transition = self.machine.process(enrollment, workflow, now).await?;

        // A stalled enrollment has no transition to persist
        if !transition.update.is_empty() {
            self.enrollments
                .update_enrollment(&enrollment.id, &transition.update)
                .await?;
        }

        Ok(transition.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::QueryStringUnsubscribe;
    use crate::memory::{
        InMemoryCatalog, InMemoryContactDirectory, InMemoryEnrollmentStore,
        InMemoryTemplateStore, RecordingGateway,
    };
    use async_trait::async_trait;
    use drip_types::{
        Contact, DripError, EmailTemplate, Enrollment, EnrollmentStatus, PassResponse,
        SenderIdentity, Step, Workflow, WorkflowId, WorkflowStats, WorkflowStatus,
    };

    struct Harness {
        catalog: Arc<InMemoryCatalog>,
        store: Arc<InMemoryEnrollmentStore>,
        contacts: Arc<InMemoryContactDirectory>,
        gateway: Arc<RecordingGateway>,
        scheduler: BatchScheduler,
        workflow: Workflow,
    }

    fn harness(config: SchedulerConfig) -> Harness {
        let catalog = Arc::new(InMemoryCatalog::new());
        let store = Arc::new(InMemoryEnrollmentStore::new());
        let contacts = Arc::new(InMemoryContactDirectory::new());
        let templates = Arc::new(InMemoryTemplateStore::new());
        let gateway = Arc::new(RecordingGateway::new());

        let machine = StateMachine::new(
            contacts.clone(),
            templates.clone(),
            gateway.clone(),
            Arc::new(QueryStringUnsubscribe),
            SenderIdentity::new("news@example.com", "News"),
            "https://mail.example.com",
        );
        let stats = StatsAggregator::new(store.clone(), catalog.clone());
        let scheduler =
            BatchScheduler::new(catalog.clone(), store.clone(), machine, stats, config);

        // One two-step workflow with immediate delays
        let t1 = EmailTemplate::new("t1", "One {{first_name}}", "<p>1</p>");
        let t2 = EmailTemplate::new("t2", "Two {{first_name}}", "<p>2</p>");
        let workflow = Workflow::new("Seq")
            .with_status(WorkflowStatus::Active)
            .with_step(Step::new(1, t1.id.clone()))
            .unwrap()
            .with_step(Step::new(2, t2.id.clone()).with_delay(0, 1, 0))
            .unwrap();
        templates.insert(t1);
        templates.insert(t2);
        catalog.insert(workflow.clone());

        Harness {
            catalog,
            store,
            contacts,
            gateway,
            scheduler,
            workflow,
        }
    }

    fn enroll(h: &Harness, workflow: &Workflow, email: &str, now: DateTime<Utc>) -> Enrollment {
        let contact = Contact::new(email).with_name("Ada", "L");
        h.contacts.insert(contact.clone());
        let enrollment = Enrollment::new(workflow.id.clone(), contact.id, now);
        h.store.insert(enrollment.clone());
        enrollment
    }

    #[tokio::test]
    async fn test_pass_advances_due_enrollment() {
        let h = harness(SchedulerConfig::default());
        let now = Utc::now();
        let workflow = h.workflow.clone();
        let enrollment = enroll(&h, &workflow, "ada@example.com", now);

        let summary = h.scheduler.run_pass(now).await;
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 0);

        let after = h.store.enrollment(&enrollment.id).unwrap();
        assert_eq!(after.current_step, 2);
        assert_eq!(after.status, EnrollmentStatus::Active);
        assert_eq!(h.gateway.sent_count(), 1);

        // Stats were recomputed and persisted
        let wf = h.catalog.workflow(&workflow.id).unwrap();
        assert_eq!(wf.stats.total_enrolled, 1);
        assert_eq!(wf.stats.total_emails_sent, 1);
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let h = harness(SchedulerConfig::default());
        let now = Utc::now();
        let workflow = h.workflow.clone();
        enroll(&h, &workflow, "ada@example.com", now);

        let first = h.scheduler.run_pass(now).await;
        assert_eq!(first.processed, 1);

        // No time has elapsed: step 2 is due in an hour
        let second = h.scheduler.run_pass(now).await;
        assert_eq!(second.processed, 0);
        assert_eq!(h.gateway.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_budget_defers_everything() {
        let h = harness(SchedulerConfig {
            time_budget: Duration::ZERO,
            batch_cap: 100,
        });
        let now = Utc::now();
        let workflow = h.workflow.clone();
        enroll(&h, &workflow, "ada@example.com", now);

        let summary = h.scheduler.run_pass(now).await;
        assert_eq!(summary.processed, 0);
        assert_eq!(h.gateway.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_claimed_enrollment_is_skipped() {
        let h = harness(SchedulerConfig::default());
        let now = Utc::now();
        let workflow = h.workflow.clone();
        let enrollment = enroll(&h, &workflow, "ada@example.com", now);

        assert!(h.scheduler.leases.claim(&enrollment.id, now));
        let summary = h.scheduler.run_pass(now).await;
        assert_eq!(summary.processed, 0);
        assert_eq!(h.gateway.sent_count(), 0);

        h.scheduler.leases.release(&enrollment.id);
        let summary = h.scheduler.run_pass(now).await;
        assert_eq!(summary.processed, 1);
    }

    #[tokio::test]
    async fn test_catalog_outage_is_not_a_quiet_pass() {
        struct OutageCatalog;

        #[async_trait]
        impl WorkflowCatalog for OutageCatalog {
            async fn active_workflows(&self) -> DripResult<Vec<Workflow>> {
                Err(DripError::Storage("catalog down".into()))
            }

            async fn record_stats(
                &self,
                _id: &WorkflowId,
                _stats: &WorkflowStats,
            ) -> DripResult<()> {
                Ok(())
            }
        }

        let catalog = Arc::new(OutageCatalog);
        let store = Arc::new(InMemoryEnrollmentStore::new());
        let machine = StateMachine::new(
            Arc::new(InMemoryContactDirectory::new()),
            Arc::new(InMemoryTemplateStore::new()),
            Arc::new(RecordingGateway::new()),
            Arc::new(QueryStringUnsubscribe),
            SenderIdentity::new("news@example.com", "News"),
            "https://mail.example.com",
        );
        let stats = StatsAggregator::new(store.clone(), catalog.clone());
        let scheduler = BatchScheduler::new(
            catalog,
            store,
            machine,
            stats,
            SchedulerConfig::default(),
        );

        let summary = scheduler.run_pass(Utc::now()).await;
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.errors, 1);
        assert!(!PassResponse::from_summary(summary, 0).success);
    }

    #[tokio::test]
    async fn test_batch_cap_limits_one_pass() {
        let h = harness(SchedulerConfig {
            time_budget: DEFAULT_TIME_BUDGET,
            batch_cap: 2,
        });
        let now = Utc::now();
        let workflow = h.workflow.clone();
        for n in 0..5 {
            enroll(&h, &workflow, &format!("c{}@example.com", n), now);
        }

        let summary = h.scheduler.run_pass(now).await;
        assert_eq!(summary.processed, 2);

        // The rest are still due and get picked up next pass
        let summary = h.scheduler.run_pass(now).await;
        assert_eq!(summary.processed, 2);
    }
}
