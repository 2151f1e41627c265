//! Violation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Violation taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// No face visible in the frame
    NoFace,
    /// More than one face visible
    MultipleFaces,
    /// The visible face does not match the enrolled reference
    FaceMismatch,
}

impl ViolationKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::NoFace => "no_face",
            ViolationKind::MultipleFaces => "multiple_faces",
            ViolationKind::FaceMismatch => "face_mismatch",
        }
    }

    /// Guidance shown to the student when warned
    pub fn guidance(&self) -> &'static str {
        match self {
            ViolationKind::NoFace => "Stay visible to the camera for the duration of the exam",
            ViolationKind::MultipleFaces => "Only the enrolled student may be in front of the camera",
            ViolationKind::FaceMismatch => "The camera must show the student who enrolled at the start",
        }
    }
}

/// A discrete, reportable policy breach.
///
/// Appended to the session's ordered violation log; never mutated or
/// removed afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// 1-based ordinal within the session
    pub number: usize,
    pub kind: ViolationKind,
    pub timestamp: DateTime<Utc>,
    /// Faces observed in the triggering sample
    pub face_count: usize,
    /// Evidence image as a data URI
    pub screenshot: String,
    /// Descriptor distance to the reference, for mismatch violations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}
