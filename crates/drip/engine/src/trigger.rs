//! Invocation trigger: credential-gated entry point for a pass
//!
//! The engine is driven by an external periodic caller (cron, a
//! serverless schedule). The caller presents a shared-secret
//! credential; a missing or invalid credential rejects the pass
//! outright. There is no warn-and-proceed path.

use crate::scheduler::{BatchScheduler, SchedulerConfig, DEFAULT_BATCH_CAP};
use chrono::Utc;
use drip_types::{DripError, DripResult, PassResponse, SenderIdentity};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Engine settings sourced from the environment.
///
/// `cron_secret`, `unsubscribe_base_url`, and `from_email` are
/// required; their absence is a configuration error fatal to the pass.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Shared secret the periodic trigger must present
    pub cron_secret: String,
    /// Base URL for unsubscribe links in the compliance footer
    pub unsubscribe_base_url: String,
    /// Identity outbound email is sent as
    pub sender: SenderIdentity,
    /// Wall-clock budget for one pass, in milliseconds
    pub time_budget_ms: u64,
    /// Per-workflow enrollment cap per pass
    pub batch_cap: usize,
}

/// Default pass budget, below common serverless invocation limits
pub const DEFAULT_TIME_BUDGET_MS: u64 = 50_000;

impl EngineConfig {
    /// Read settings from `DRIP_*` environment variables
    pub fn from_env() -> DripResult<Self> {
        let cron_secret = required("DRIP_CRON_SECRET")?;
        let unsubscribe_base_url = required("DRIP_UNSUBSCRIBE_BASE_URL")?;
        let from_email = required("DRIP_FROM_EMAIL")?;

        let from_name = std::env::var("DRIP_FROM_NAME").unwrap_or_default();
        let mut sender = SenderIdentity::new(from_email, from_name);
        if let Ok(reply_to) = std::env::var("DRIP_REPLY_TO") {
            sender = sender.with_reply_to(reply_to);
        }

        Ok(Self {
            cron_secret,
            unsubscribe_base_url,
            sender,
            time_budget_ms: parsed("DRIP_TIME_BUDGET_MS", DEFAULT_TIME_BUDGET_MS)?,
            batch_cap: parsed("DRIP_BATCH_CAP", DEFAULT_BATCH_CAP)?,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            time_budget: Duration::from_millis(self.time_budget_ms),
            batch_cap: self.batch_cap,
        }
    }
}

fn required(key: &str) -> DripResult<String> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(DripError::Configuration(format!(
            "required setting {} is not set",
            key
        ))),
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> DripResult<T> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| DripError::Configuration(format!("setting {} is not a number", key))),
        Err(_) => Ok(default),
    }
}

/// Validates the trigger credential and runs a pass
pub struct TriggerHandler {
    scheduler: BatchScheduler,
    cron_secret: String,
}

impl TriggerHandler {
    pub fn new(scheduler: BatchScheduler, cron_secret: impl Into<String>) -> Self {
        Self {
            scheduler,
            cron_secret: cron_secret.into(),
        }
    }

    /// Run one authorized pass.
    ///
    /// Fails closed: an absent or mismatched credential returns
    /// `Unauthorized` and nothing is processed.
    pub async fn handle(&self, credential: Option<&str>) -> DripResult<PassResponse> {
        match credential {
            Some(presented) if presented == self.cron_secret => {}
            _ => {
                warn!("pass rejected: missing or invalid trigger credential");
                return Err(DripError::Unauthorized);
            }
        }

        let started = Instant::now();
        let summary = self.scheduler.run_pass(Utc::now()).await;
        let response =
            PassResponse::from_summary(summary, started.elapsed().as_millis() as u64);
        info!(
            processed = response.processed,
            sent = response.sent,
            failed = response.failed,
            execution_time_ms = response.execution_time_ms,
            "trigger pass complete"
        );
        Ok(response)
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
    use crate::state_machine::StateMachine;
    use crate::stats::StatsAggregator;
    use std::sync::Arc;

    fn handler() -> TriggerHandler {
        let catalog = Arc::new(InMemoryCatalog::new());
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
        TriggerHandler::new(scheduler, "s3cret")
    }

    #[tokio::test]
    async fn test_missing_credential_fails_closed() {
        let handler = handler();
        assert!(matches!(
            handler.handle(None).await,
            Err(DripError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_wrong_credential_fails_closed() {
        let handler = handler();
        assert!(matches!(
            handler.handle(Some("nope")).await,
            Err(DripError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_valid_credential_runs_pass() {
        let handler = handler();
        let response = handler.handle(Some("s3cret")).await.unwrap();
        assert!(response.success);
        assert_eq!(response.processed, 0);
    }

    #[test]
    fn test_config_from_env() {
        // One test owns all DRIP_* variables to avoid races between
        // parallel tests mutating the same process environment.
        std::env::set_var("DRIP_CRON_SECRET", "s");
        std::env::set_var("DRIP_UNSUBSCRIBE_BASE_URL", "https://x");
        std::env::set_var("DRIP_FROM_EMAIL", "n@x.com");
        std::env::set_var("DRIP_TIME_BUDGET_MS", "1000");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.cron_secret, "s");
        assert_eq!(config.time_budget_ms, 1_000);
        assert_eq!(config.batch_cap, DEFAULT_BATCH_CAP);
        assert_eq!(config.sender.reply_to, "n@x.com");
        assert_eq!(
            config.scheduler_config().time_budget,
            Duration::from_millis(1_000)
        );

        std::env::remove_var("DRIP_CRON_SECRET");
        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(err, DripError::Configuration(_)));

        std::env::remove_var("DRIP_UNSUBSCRIBE_BASE_URL");
        std::env::remove_var("DRIP_FROM_EMAIL");
        std::env::remove_var("DRIP_TIME_BUDGET_MS");
    }
}
