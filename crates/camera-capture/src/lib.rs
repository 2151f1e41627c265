//! Camera Capture for Proctored Exam Sessions
//!
//! Owns the camera acquisition lifecycle:
//! - Exclusive capture sessions with deterministic release
//! - Bounded readiness waiting before any detection runs
//! - Pluggable video sources (device backends, synthetic test streams)

pub mod frame;
pub mod readiness;
pub mod session;
pub mod source;

pub use frame::VideoFrame;
pub use readiness::wait_until;
pub use session::CaptureSession;
pub use source::{SourceFactory, SyntheticSource, VideoSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera access failed: {0}")]
    Access(String),

    #[error("Camera not ready after {waited_ms}ms")]
    NotReady { waited_ms: u64 },

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Camera not started")]
    NotStarted,
}

/// Facing preference for device selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraFacing {
    /// Camera pointed at the person in front of the screen
    User,
    /// Camera pointed away from the screen
    Environment,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device identifier (e.g., "/dev/video0")
    pub device: String,
    /// Requested capture width (negotiable)
    pub width: u32,
    /// Requested capture height (negotiable)
    pub height: u32,
    /// Requested FPS
    pub fps: u32,
    /// Facing preference
    pub facing: CameraFacing,
    /// Bound on the readiness wait (milliseconds)
    pub ready_timeout_ms: u64,
    /// Poll interval during the readiness wait (milliseconds)
    pub ready_poll_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 15,
            facing: CameraFacing::User,
            ready_timeout_ms: 10_000,
            ready_poll_ms: 100,
        }
    }
}

impl CameraConfig {
    /// User-facing webcam at the preferred proctoring resolution
    pub fn user_facing() -> Self {
        Self::default()
    }
}
