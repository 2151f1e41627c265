//! Reference Face Enrollment
//!
//! Captures the one authorized face descriptor for a session:
//! - Bounded camera-ready wait before the first attempt
//! - Progressive relaxation (lower score floor, then larger input)
//! - Deterministic best-face selection on crowded frames

use camera_capture::{CameraError, CaptureSession};
use chrono::{DateTime, Utc};
use inference_engine::{DetectOptions, FaceAnalyzer, FaceDescriptor, InferenceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Enrollment error types
#[derive(Error, Debug)]
pub enum EnrollmentError {
    #[error("No usable face found across {attempts} enrollment attempts")]
    NoFaceFound { attempts: usize },

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
}

/// The enrolled authorized face.
///
/// Immutable once installed; a session only replaces it wholesale through
/// a new successful enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFace {
    pub descriptor: FaceDescriptor,
    /// Detector confidence at capture time
    pub confidence: f32,
    pub captured_at: DateTime<Utc>,
}

/// Cascade parameters for reference capture.
///
/// Capture is a one-shot, user-facing gate, so the cascade trades latency
/// for success rate instead of failing on the first strict attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// First-attempt detection parameters
    pub base: DetectOptions,
    /// Relaxed score floor for the second cascade step
    pub relaxed_score_threshold: f32,
    /// Enlarged detector input for the final cascade step
    pub enlarged_width: u32,
    pub enlarged_height: u32,
    /// Frames tried per cascade step
    pub attempts_per_step: usize,
    /// Delay between attempts (milliseconds)
    pub attempt_delay_ms: u64,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            base: DetectOptions::default(),
            relaxed_score_threshold: 0.5,
            enlarged_width: 640,
            enlarged_height: 480,
            attempts_per_step: 2,
            attempt_delay_ms: 150,
        }
    }
}

impl EnrollmentConfig {
    /// More retries per step, for poor lighting conditions
    pub fn persistent() -> Self {
        Self {
            attempts_per_step: 4,
            ..Default::default()
        }
    }

    /// The detection parameter cascade, strictest first
    pub fn cascade(&self) -> Vec<DetectOptions> {
        vec![
            self.base.descriptors(true),
            self.base
                .score_floor(self.relaxed_score_threshold)
                .descriptors(true),
            self.base
                .score_floor(self.relaxed_score_threshold)
                .input_size(self.enlarged_width, self.enlarged_height)
                .descriptors(true),
        ]
    }
}

/// Capture a reference face from the live camera.
///
/// Requires an acquired camera; performs the bounded ready-wait first if
/// the stream has not been confirmed ready. On a crowded frame the
/// highest-confidence face is enrolled. Exhausting the cascade yields
/// `NoFaceFound` and the caller's prior reference, if any, stays in
/// effect.
pub async fn capture_reference(
    session: &mut CaptureSession,
    analyzer: &mut dyn FaceAnalyzer,
    config: &EnrollmentConfig,
) -> Result<ReferenceFace, EnrollmentError> {
    if !session.is_ready() {
        session.wait_ready().await?;
    }

    let delay = Duration::from_millis(config.attempt_delay_ms);
    let mut attempts = 0;

    for (step, opts) in config.cascade().iter().enumerate() {
        for _ in 0..config.attempts_per_step.max(1) {
            if attempts > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            let frame = session.grab()?;
            let sample = analyzer.analyze(&frame, opts)?;

            let candidate = match sample.face_count() {
                0 => {
                    debug!(attempt = attempts, step, "no face visible");
                    continue;
                }
                1 => sample.faces.into_iter().next(),
                n => {
                    warn!(
                        faces = n,
                        attempt = attempts,
                        "multiple faces during enrollment, taking the most confident"
                    );
                    let best = sample.best_face().cloned();
                    best
                }
            };

            if let Some(face) = candidate {
                match face.descriptor {
                    Some(descriptor) => {
                        info!(
                            attempt = attempts,
                            step,
                            confidence = face.confidence,
                            "reference face captured"
                        );
                        return Ok(ReferenceFace {
                            descriptor,
                            confidence: face.confidence,
                            captured_at: Utc::now(),
                        });
                    }
                    None => {
                        debug!(attempt = attempts, step, "face found but descriptor missing");
                    }
                }
            }
        }
    }

    warn!(attempts, "enrollment cascade exhausted without a usable face");
    Err(EnrollmentError::NoFaceFound { attempts })
}
