//! Violation Classification & Ejection Policy
//!
//! Consumes detection samples while a session is monitored:
//! - Classifies each sample against the enrolled reference
//! - Records discrete violations with evidence, append-only
//! - Drives the one-way ejection decision

pub mod classify;
pub mod machine;
pub mod violation;

pub use classify::{classify, distance_to_reference, Classification};
pub use machine::{PolicyConfig, PolicyEngine, PolicyOutcome, ProctorPhase};
pub use violation::{Violation, ViolationKind};

use thiserror::Error;

/// Policy error types
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Monitoring requires an enrolled reference face")]
    NoReference,

    #[error("Session has been ejected and cannot resume")]
    SessionEjected,

    #[error("Camera and models must be ready before monitoring")]
    NotReady,
}
