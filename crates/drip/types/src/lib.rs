//! Drip Domain Types
//!
//! Shared types for the Drip enrollment engine. A **Workflow** is an
//! ordered sequence of timed email steps; an **Enrollment** is one
//! contact's progress instance through one workflow.
//!
//! # Key Concepts
//!
//! - **Workflow**: A named automation definition composed of [`Step`]s,
//!   each pairing a template with a relative delay.
//! - **Enrollment**: Tracks which step a contact is on, when the next
//!   send becomes due, and the append-only history of step results.
//! - **EnrollmentUpdate**: An explicit partial update enumerating every
//!   mutable enrollment field. All transitions are expressed as updates,
//!   never as ad-hoc field bags.
//! - **WorkflowStats**: A derived rollup recomputed from the enrollment
//!   set, never incrementally maintained.
//!
//! # Design Principles
//!
//! 1. Terminal enrollment statuses never transition further.
//! 2. Step history is append-only; failure counts are derived by
//!    scanning it, never stored alongside it.
//! 3. Due-ness is persisted on the enrollment (`next_send_date`), so a
//!    processing pass can be interrupted and resumed without losing
//!    progress.

#![deny(unsafe_code)]

mod contact;
mod enrollment;
mod errors;
mod message;
mod pass;
mod stats;
mod template;
mod workflow;

pub use contact::*;
pub use enrollment::*;
pub use errors::*;
pub use message::*;
pub use pass::*;
pub use stats::*;
pub use template::*;
pub use workflow::*;
