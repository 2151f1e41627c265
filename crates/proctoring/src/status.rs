//! Live observable state

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use violation_policy::ProctorPhase;

/// Snapshot of the proctoring session, published on every change.
///
/// The host renders from this; it never needs to reach into the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub phase: ProctorPhase,
    /// Camera and models are both up
    pub initialized: bool,
    pub models_loaded: bool,
    pub camera_ready: bool,
    pub has_reference: bool,
    pub is_monitoring: bool,
    pub is_violating: bool,
    /// Faces seen in the most recent sample
    pub face_count: usize,
    pub violation_count: usize,
    /// Distance of the last single-face sample to the reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_distance: Option<f32>,
    /// Detection throughput actually achieved
    pub effective_fps: f32,
    /// Most recent camera failure, for the host to render
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_error: Option<String>,
}

/// Rolling window of detection cycle costs.
///
/// Derives the effective detection rate from wall-clock cost per accepted
/// tick; the loop caps the readout at the configured target rate.
#[derive(Debug)]
pub struct FpsWindow {
    costs: VecDeque<Duration>,
    capacity: usize,
}

impl FpsWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            costs: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record one cycle's wall-clock cost
    pub fn push(&mut self, cost: Duration) {
        if self.costs.len() >= self.capacity {
            self.costs.pop_front();
        }
        self.costs.push_back(cost);
    }

    /// Cycles per second the recent window sustained
    pub fn per_second(&self) -> f32 {
        let total: Duration = self.costs.iter().sum();
        if total.is_zero() {
            return 0.0;
        }
        self.costs.len() as f32 / total.as_secs_f32()
    }

    pub fn clear(&mut self) {
        self.costs.clear();
    }
}
