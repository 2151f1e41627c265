//! Proctoring configuration

use crate::ProctorError;
use camera_capture::CameraConfig;
use ::config::{Config, Environment, File};
use enrollment::EnrollmentConfig;
use inference_engine::{DetectOptions, ModelSources};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use violation_policy::PolicyConfig;

/// Sampling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Target detection rate (Hz), independent of the camera frame rate
    pub target_hz: f64,
    /// Detection parameters used for monitoring ticks
    pub detect: DetectOptions,
    /// Consecutive failed cycles before the camera pipeline is restarted
    pub max_consecutive_failures: u32,
    /// Tick costs kept for the effective-fps readout
    pub fps_window: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            target_hz: 8.0,
            detect: DetectOptions::default(),
            max_consecutive_failures: 5,
            fps_window: 30,
        }
    }
}

impl SamplingConfig {
    /// Interval between accepted detection ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_hz.max(0.1))
    }
}

/// Complete configuration for one proctoring instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    pub camera: CameraConfig,
    pub models: ModelSources,
    pub enrollment: EnrollmentConfig,
    pub policy: PolicyConfig,
    pub sampling: SamplingConfig,
}

impl ProctorConfig {
    /// Load layered configuration: defaults, then an optional file, then
    /// `PROCTOR__`-prefixed environment overrides.
    pub fn load(path: &str) -> Result<Self, ProctorError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("PROCTOR").separator("__"))
            .build()
            .map_err(|e| ProctorError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ProctorError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sampling_rate() {
        let config = SamplingConfig::default();
        assert!((config.target_hz - 8.0).abs() < 1e-9);
        assert_eq!(config.tick_interval(), Duration::from_millis(125));
    }

    #[test]
    fn test_tick_interval_guards_zero_rate() {
        let config = SamplingConfig {
            target_hz: 0.0,
            ..Default::default()
        };
        assert!(config.tick_interval() <= Duration::from_secs(10));
    }

    #[test]
    fn test_default_policy_thresholds() {
        let config = ProctorConfig::default();
        assert!((config.policy.mismatch_threshold - 0.6).abs() < 1e-6);
        assert_eq!(config.policy.ejection_threshold, 3);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = ProctorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ProctorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sampling.fps_window, config.sampling.fps_window);
        assert_eq!(parsed.camera.width, config.camera.width);
    }
}
