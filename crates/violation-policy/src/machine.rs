//! Session state machine and ejection policy

use crate::classify::{classify, Classification};
use crate::violation::{Violation, ViolationKind};
use crate::PolicyError;
use chrono::Utc;
use enrollment::ReferenceFace;
use inference_engine::DetectionSample;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProctorPhase {
    /// Nothing is set up yet
    #[default]
    Idle,
    /// Camera and models are ready; waiting for enrollment
    AwaitingReference,
    /// Armed and consuming samples
    Monitoring,
    /// A violating sample was just observed; clears on the next clean one
    Violating,
    /// Ejection threshold reached; terminal for the session
    Ejected,
}

/// Policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Descriptor distance above which a face is a mismatch
    pub mismatch_threshold: f32,
    /// Violations at which the session is ejected
    pub ejection_threshold: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mismatch_threshold: 0.6,
            ejection_threshold: 3,
        }
    }
}

impl PolicyConfig {
    /// Tighter matching and fewer allowed violations
    pub fn strict() -> Self {
        Self {
            mismatch_threshold: 0.5,
            ejection_threshold: 2,
        }
    }

    /// Looser matching for low-quality cameras
    pub fn lenient() -> Self {
        Self {
            mismatch_threshold: 0.7,
            ejection_threshold: 5,
        }
    }
}

/// What the policy decided for one observed sample
#[derive(Debug, Clone)]
pub enum PolicyOutcome {
    /// Sample ignored: the session is not monitoring, or already ejected
    Ignored,
    /// Sample classified clear
    Clear,
    /// A violation below the ejection threshold was recorded
    Violation(Violation),
    /// The recorded violation crossed the ejection threshold
    Ejected(Violation),
}

/// The violation classifier and policy state machine.
///
/// Owns the enrolled reference and the append-only violation log; the
/// log's length is the sole driver of the ejection decision.
pub struct PolicyEngine {
    config: PolicyConfig,
    phase: ProctorPhase,
    reference: Option<ReferenceFace>,
    violations: Vec<Violation>,
    ejection_fired: bool,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            phase: ProctorPhase::Idle,
            reference: None,
            violations: Vec::new(),
            ejection_fired: false,
        }
    }

    pub fn phase(&self) -> ProctorPhase {
        self.phase
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Camera and models came up; enrollment may begin
    pub fn mark_ready(&mut self) {
        if self.phase == ProctorPhase::Idle {
            self.phase = ProctorPhase::AwaitingReference;
            debug!("awaiting reference enrollment");
        }
    }

    /// Install a freshly enrolled reference, replacing any prior one
    /// entirely. Does not arm monitoring.
    pub fn install_reference(&mut self, reference: ReferenceFace) {
        info!(confidence = reference.confidence, "reference face installed");
        self.reference = Some(reference);
    }

    pub fn reference(&self) -> Option<&ReferenceFace> {
        self.reference.as_ref()
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Arm monitoring. Requires an enrolled reference; idempotent while
    /// already monitoring; refused after ejection.
    pub fn start_monitoring(&mut self) -> Result<(), PolicyError> {
        if self.phase == ProctorPhase::Ejected {
            return Err(PolicyError::SessionEjected);
        }
        if self.reference.is_none() {
            return Err(PolicyError::NoReference);
        }
        if !self.is_monitoring() {
            info!("monitoring started");
            self.phase = ProctorPhase::Monitoring;
        }
        Ok(())
    }

    /// Whether samples are currently consumed
    pub fn is_monitoring(&self) -> bool {
        matches!(self.phase, ProctorPhase::Monitoring | ProctorPhase::Violating)
    }

    /// Whether the last observed sample violated
    pub fn is_violating(&self) -> bool {
        self.phase == ProctorPhase::Violating
    }

    /// Drop the violating display flag without consuming a sample.
    ///
    /// Used when monitoring halts mid-violation (camera stopped) so the
    /// flag does not outlive the stream it was derived from.
    pub fn clear_violating(&mut self) {
        if self.phase == ProctorPhase::Violating {
            self.phase = ProctorPhase::Monitoring;
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Consume one detection sample.
    ///
    /// `evidence` is invoked at most once, only when a violation is
    /// recorded, and supplies the encoded screenshot for the record.
    pub fn observe<E>(&mut self, sample: &DetectionSample, evidence: E) -> PolicyOutcome
    where
        E: FnOnce() -> String,
    {
        if !self.is_monitoring() {
            return PolicyOutcome::Ignored;
        }

        let classification = classify(
            sample,
            self.reference.as_ref(),
            self.config.mismatch_threshold,
        );

        let Some(kind) = classification.violation_kind() else {
            self.phase = ProctorPhase::Monitoring;
            return PolicyOutcome::Clear;
        };

        let violation = self.record(kind, sample.face_count(), classification, evidence());
        if self.violations.len() >= self.config.ejection_threshold && !self.ejection_fired {
            self.ejection_fired = true;
            self.phase = ProctorPhase::Ejected;
            warn!(
                violations = self.violations.len(),
                "ejection threshold reached, session terminated"
            );
            PolicyOutcome::Ejected(violation)
        } else {
            self.phase = ProctorPhase::Violating;
            PolicyOutcome::Violation(violation)
        }
    }

    fn record(
        &mut self,
        kind: ViolationKind,
        face_count: usize,
        classification: Classification,
        screenshot: String,
    ) -> Violation {
        let violation = Violation {
            number: self.violations.len() + 1,
            kind,
            timestamp: Utc::now(),
            face_count,
            screenshot,
            distance: classification.distance(),
        };
        warn!(
            number = violation.number,
            kind = violation.kind.as_str(),
            face_count,
            "violation recorded"
        );
        self.violations.push(violation.clone());
        violation
    }

    /// Reset the whole session: clears the reference, the violation log,
    /// and the phase. The only path out of `Ejected`.
    pub fn reset(&mut self) {
        info!("policy state reset");
        self.phase = ProctorPhase::Idle;
        self.reference = None;
        self.violations.clear();
        self.ejection_fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference_engine::{FaceBox, FaceDescriptor, FaceObservation};

    fn descriptor_at(offset: f32) -> FaceDescriptor {
        let mut v = vec![0.0; 128];
        v[0] = 1.0;
        v[1] = offset;
        FaceDescriptor::new(v)
    }

    fn reference() -> ReferenceFace {
        let mut v = vec![0.0; 128];
        v[0] = 1.0;
        ReferenceFace {
            descriptor: FaceDescriptor::new(v),
            confidence: 0.95,
            captured_at: Utc::now(),
        }
    }

    fn observation(descriptor: Option<FaceDescriptor>) -> FaceObservation {
        FaceObservation {
            bbox: FaceBox {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 100.0,
            },
            confidence: 0.9,
            landmarks: None,
            descriptor,
        }
    }

    fn sample_with_faces(count: usize) -> DetectionSample {
        DetectionSample {
            faces: (0..count)
                .map(|_| observation(Some(descriptor_at(0.1))))
                .collect(),
            frame_width: 640,
            frame_height: 480,
        }
    }

    fn mismatch_sample() -> DetectionSample {
        DetectionSample {
            faces: vec![observation(Some(descriptor_at(0.9)))],
            frame_width: 640,
            frame_height: 480,
        }
    }

    fn evidence() -> String {
        "data:image/jpeg;base64,AAAA".to_string()
    }

    fn monitoring_engine() -> PolicyEngine {
        let mut engine = PolicyEngine::new(PolicyConfig::default());
        engine.mark_ready();
        engine.install_reference(reference());
        engine.start_monitoring().unwrap();
        engine
    }

    #[test]
    fn test_samples_ignored_before_monitoring() {
        let mut engine = PolicyEngine::new(PolicyConfig::default());
        assert!(matches!(
            engine.observe(&sample_with_faces(0), evidence),
            PolicyOutcome::Ignored
        ));
        engine.mark_ready();
        assert!(matches!(
            engine.observe(&sample_with_faces(0), evidence),
            PolicyOutcome::Ignored
        ));
        assert_eq!(engine.violation_count(), 0);
    }

    #[test]
    fn test_monitoring_requires_reference() {
        let mut engine = PolicyEngine::new(PolicyConfig::default());
        engine.mark_ready();
        assert!(matches!(
            engine.start_monitoring(),
            Err(PolicyError::NoReference)
        ));

        engine.install_reference(reference());
        assert!(engine.start_monitoring().is_ok());
        assert!(engine.is_monitoring());
    }

    #[test]
    fn test_enrollment_does_not_auto_arm() {
        let mut engine = PolicyEngine::new(PolicyConfig::default());
        engine.mark_ready();
        engine.install_reference(reference());
        assert!(!engine.is_monitoring());
        assert_eq!(engine.phase(), ProctorPhase::AwaitingReference);
    }

    #[test]
    fn test_violation_per_non_clear_sample() {
        let mut engine = monitoring_engine();

        // clear, no-face, clear, multiple: two violations
        assert!(matches!(
            engine.observe(&sample_with_faces(1), evidence),
            PolicyOutcome::Clear
        ));
        assert!(matches!(
            engine.observe(&sample_with_faces(0), evidence),
            PolicyOutcome::Violation(_)
        ));
        assert!(matches!(
            engine.observe(&sample_with_faces(1), evidence),
            PolicyOutcome::Clear
        ));
        assert!(matches!(
            engine.observe(&sample_with_faces(2), evidence),
            PolicyOutcome::Violation(_)
        ));

        assert_eq!(engine.violation_count(), 2);
        assert_eq!(engine.violations()[0].kind, ViolationKind::NoFace);
        assert_eq!(engine.violations()[1].kind, ViolationKind::MultipleFaces);
        assert_eq!(engine.violations()[0].number, 1);
        assert_eq!(engine.violations()[1].number, 2);
    }

    #[test]
    fn test_violating_flag_is_not_sticky() {
        let mut engine = monitoring_engine();

        engine.observe(&sample_with_faces(0), evidence);
        assert!(engine.is_violating());
        assert_eq!(engine.phase(), ProctorPhase::Violating);

        engine.observe(&sample_with_faces(1), evidence);
        assert!(!engine.is_violating());
        assert_eq!(engine.phase(), ProctorPhase::Monitoring);
    }

    #[test]
    fn test_ejection_fires_exactly_once_at_threshold() {
        let mut engine = monitoring_engine();

        assert!(matches!(
            engine.observe(&sample_with_faces(0), evidence),
            PolicyOutcome::Violation(v) if v.number == 1
        ));
        assert!(matches!(
            engine.observe(&sample_with_faces(2), evidence),
            PolicyOutcome::Violation(v) if v.number == 2
        ));
        assert!(matches!(
            engine.observe(&sample_with_faces(0), evidence),
            PolicyOutcome::Ejected(v) if v.number == 3
        ));
        assert_eq!(engine.phase(), ProctorPhase::Ejected);

        // Terminal: later samples are ignored, the count never moves
        assert!(matches!(
            engine.observe(&sample_with_faces(0), evidence),
            PolicyOutcome::Ignored
        ));
        assert_eq!(engine.violation_count(), 3);
        assert!(matches!(
            engine.start_monitoring(),
            Err(PolicyError::SessionEjected)
        ));
    }

    #[test]
    fn test_mismatch_records_distance() {
        let mut engine = monitoring_engine();
        match engine.observe(&mismatch_sample(), evidence) {
            PolicyOutcome::Violation(v) => {
                assert_eq!(v.kind, ViolationKind::FaceMismatch);
                let d = v.distance.unwrap();
                assert!((d - 0.9).abs() < 1e-5);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_count_violations_never_record_distance() {
        let mut engine = monitoring_engine();
        match engine.observe(&sample_with_faces(2), evidence) {
            PolicyOutcome::Violation(v) => {
                assert_eq!(v.kind, ViolationKind::MultipleFaces);
                assert!(v.distance.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_evidence_attached_to_violation() {
        let mut engine = monitoring_engine();
        match engine.observe(&sample_with_faces(0), || "data:image/jpeg;base64,EV".to_string()) {
            PolicyOutcome::Violation(v) => {
                assert_eq!(v.screenshot, "data:image/jpeg;base64,EV");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_reference_replaced_wholesale() {
        let mut engine = PolicyEngine::new(PolicyConfig::default());
        engine.mark_ready();
        engine.install_reference(reference());
        let first = engine.reference().unwrap().descriptor.clone();

        let replacement = ReferenceFace {
            descriptor: descriptor_at(0.3),
            confidence: 0.8,
            captured_at: Utc::now(),
        };
        engine.install_reference(replacement);
        assert_ne!(engine.reference().unwrap().descriptor, first);
    }

    #[test]
    fn test_clear_violating_does_not_touch_log() {
        let mut engine = monitoring_engine();
        engine.observe(&sample_with_faces(0), evidence);
        assert!(engine.is_violating());

        engine.clear_violating();
        assert!(!engine.is_violating());
        assert!(engine.is_monitoring());
        assert_eq!(engine.violation_count(), 1);
    }

    #[test]
    fn test_reset_is_the_only_path_out_of_ejected() {
        let mut engine = monitoring_engine();
        for _ in 0..3 {
            engine.observe(&sample_with_faces(0), evidence);
        }
        assert_eq!(engine.phase(), ProctorPhase::Ejected);

        engine.reset();
        assert_eq!(engine.phase(), ProctorPhase::Idle);
        assert!(!engine.has_reference());
        assert_eq!(engine.violation_count(), 0);
    }

    #[test]
    fn test_custom_ejection_threshold() {
        let mut engine = PolicyEngine::new(PolicyConfig {
            ejection_threshold: 2,
            ..PolicyConfig::default()
        });
        engine.mark_ready();
        engine.install_reference(reference());
        engine.start_monitoring().unwrap();

        assert!(matches!(
            engine.observe(&sample_with_faces(0), evidence),
            PolicyOutcome::Violation(_)
        ));
        assert!(matches!(
            engine.observe(&sample_with_faces(0), evidence),
            PolicyOutcome::Ejected(_)
        ));
    }

    #[test]
    fn test_presets() {
        let strict = PolicyConfig::strict();
        let lenient = PolicyConfig::lenient();
        assert!(strict.mismatch_threshold < lenient.mismatch_threshold);
        assert!(strict.ejection_threshold < lenient.ejection_threshold);
    }
}
