//! Exam Proctoring Core
//!
//! Orchestrates the detection pipeline for one exam attempt:
//! - Camera and model bring-up
//! - Reference enrollment
//! - Rate-limited sampling loop feeding the violation policy
//! - Live status publication and host event delivery

pub mod config;
pub mod events;
pub mod monitor;
pub mod status;

pub use crate::config::{ProctorConfig, SamplingConfig};
pub use events::{
    forward_events, EjectionReport, ProctorEvent, ViolationReport, ViolationSink,
};
pub use monitor::{Proctor, StopSignal};
pub use status::MonitorStatus;

use camera_capture::CameraError;
use enrollment::EnrollmentError;
use inference_engine::InferenceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use violation_policy::PolicyError;

/// Proctoring error types
#[derive(Error, Debug)]
pub enum ProctorError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Enrollment error: {0}")]
    Enrollment(#[from] EnrollmentError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Identity of the proctored exam attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSession {
    pub session_id: Uuid,
    pub student_id: String,
    pub exam_id: String,
}

impl ExamSession {
    pub fn new(student_id: impl Into<String>, exam_id: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            student_id: student_id.into(),
            exam_id: exam_id.into(),
        }
    }
}
