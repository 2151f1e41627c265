//! Face Inference Engine
//!
//! ONNX-backed face analysis for proctoring:
//! - Three-artifact model bundle (detector, landmark predictor, recognizer)
//! - Primary source with full-set fallback retry
//! - Per-frame detection with landmarks and identity descriptors

pub mod analyzer;
pub mod descriptor;
pub mod models;

pub use analyzer::{
    DetectOptions, DetectionSample, FaceAnalyzer, FaceBox, FaceObservation, OnnxFaceAnalyzer,
};
pub use descriptor::{FaceDescriptor, EMBEDDING_DIM};
pub use models::{ModelBundle, ModelSources};

use thiserror::Error;

/// Errors during model loading and inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("All model sources failed: primary: {primary}; fallback: {fallback}")]
    SourcesExhausted { primary: String, fallback: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}
