//! Model bundle loading and compute backend selection

use crate::InferenceError;
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Coarse face detector artifact name
pub const DETECTOR_MODEL: &str = "face_detector.onnx";
/// Landmark predictor artifact name
pub const LANDMARK_MODEL: &str = "face_landmarks.onnx";
/// Descriptor/recognition network artifact name
pub const RECOGNIZER_MODEL: &str = "face_recognizer.onnx";

/// Where model artifacts are loaded from.
///
/// The primary directory is tried first for the complete set; any failure
/// retries the complete set from the fallback directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSources {
    pub primary: PathBuf,
    pub fallback: Option<PathBuf>,
}

impl Default for ModelSources {
    fn default() -> Self {
        Self {
            primary: PathBuf::from("models"),
            fallback: None,
        }
    }
}

/// The three loaded inference sessions backing face analysis.
///
/// Existence of a bundle implies all three artifacts loaded from a single
/// source; there is no partially loaded state.
#[derive(Debug)]
pub struct ModelBundle {
    pub(crate) detector: Session,
    pub(crate) landmarks: Session,
    pub(crate) recognizer: Session,
}

impl ModelBundle {
    /// Load all three artifacts, falling back to the secondary source if
    /// the primary fails.
    pub fn load(sources: &ModelSources) -> Result<Self, InferenceError> {
        match Self::load_from(&sources.primary) {
            Ok(bundle) => {
                info!(dir = %sources.primary.display(), "models loaded from primary source");
                Ok(bundle)
            }
            Err(primary_err) => match &sources.fallback {
                Some(fallback_dir) => {
                    warn!(
                        error = %primary_err,
                        fallback = %fallback_dir.display(),
                        "primary model source failed, retrying fallback"
                    );
                    match Self::load_from(fallback_dir) {
                        Ok(bundle) => {
                            info!(dir = %fallback_dir.display(), "models loaded from fallback source");
                            Ok(bundle)
                        }
                        Err(fallback_err) => Err(InferenceError::SourcesExhausted {
                            primary: primary_err.to_string(),
                            fallback: fallback_err.to_string(),
                        }),
                    }
                }
                None => Err(primary_err),
            },
        }
    }

    fn load_from(dir: &Path) -> Result<Self, InferenceError> {
        Ok(Self {
            detector: load_session(&dir.join(DETECTOR_MODEL))?,
            landmarks: load_session(&dir.join(LANDMARK_MODEL))?,
            recognizer: load_session(&dir.join(RECOGNIZER_MODEL))?,
        })
    }
}

fn load_session(path: &Path) -> Result<Session, InferenceError> {
    Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|b| b.with_execution_providers(preferred_execution_providers()))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| InferenceError::ModelLoad(format!("{}: {e}", path.display())))
}

/// Preferred compute backends for the current platform.
///
/// Runtime falls back to CPU when a provider fails to register, so backend
/// selection never fails a load on its own.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "linux")]
    {
        vec![ort::execution_providers::CUDAExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        vec![]
    }
}
