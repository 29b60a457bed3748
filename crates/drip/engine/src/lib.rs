//! Drip Enrollment Engine
//!
//! A periodically-invoked batch processor that advances contacts
//! through multi-step, time-delayed email sequences. One invocation is
//! a **pass**: the scheduler visits every active workflow under a
//! wall-clock budget, the state machine transitions each due enrollment
//! exactly once, and the stats aggregator refreshes per-workflow
//! rollups afterwards.
//!
//! # Key Principle
//!
//! **All progress is persisted on the enrollment itself.** Due-ness
//! lives in `next_send_date`, failure counts are derived from the step
//! history, and every transition is a single store write. A pass can
//! therefore stop at any workflow boundary — budget exhausted, crash,
//! redeploy — and the next pass picks up exactly where work remains.
//!
//! # Architecture
//!
//! The [`BatchScheduler`] composes specialized components:
//!
//! - [`StateMachine`] — per-enrollment transition logic
//! - [`StatsAggregator`] — recomputes workflow rollups after a batch
//! - [`LeaseTable`] — claim-with-TTL guard against overlapping passes
//! - [`renderer`] — pure template substitution plus compliance footer
//!
//! Collaborators (catalog, stores, gateway) are consumed through the
//! narrow async traits in [`collaborators`]; in-memory implementations
//! for development and testing live in [`memory`].

#![deny(unsafe_code)]

pub mod collaborators;
pub mod lease;
pub mod memory;
pub mod renderer;
pub mod scheduler;
pub mod state_machine;
pub mod stats;
pub mod trigger;

// Re-export main types
pub use collaborators::{
    ContactDirectory, DeliveryGateway, EnrollmentStore, QueryStringUnsubscribe, TemplateStore,
    UnsubscribeUrlBuilder, WorkflowCatalog,
};
pub use lease::LeaseTable;
pub use scheduler::{BatchScheduler, SchedulerConfig};
pub use state_machine::{StallReason, StateMachine, Transition, TransitionOutcome};
pub use stats::StatsAggregator;
pub use trigger::{EngineConfig, TriggerHandler};
