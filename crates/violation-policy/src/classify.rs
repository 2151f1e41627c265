//! Per-sample classification

use crate::violation::ViolationKind;
use enrollment::ReferenceFace;
use inference_engine::DetectionSample;

/// Outcome of classifying one detection sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    /// Exactly one face, matching the reference (or no reference to check)
    Clear,
    NoFace,
    MultipleFaces { count: usize },
    FaceMismatch { distance: f32 },
}

impl Classification {
    pub fn is_clear(&self) -> bool {
        matches!(self, Classification::Clear)
    }

    /// The violation kind this classification maps to, if any
    pub fn violation_kind(&self) -> Option<ViolationKind> {
        match self {
            Classification::Clear => None,
            Classification::NoFace => Some(ViolationKind::NoFace),
            Classification::MultipleFaces { .. } => Some(ViolationKind::MultipleFaces),
            Classification::FaceMismatch { .. } => Some(ViolationKind::FaceMismatch),
        }
    }

    /// Descriptor distance, for mismatch classifications
    pub fn distance(&self) -> Option<f32> {
        match self {
            Classification::FaceMismatch { distance } => Some(*distance),
            _ => None,
        }
    }
}

/// Classify one sample against the enrolled reference.
///
/// Face-count violations take precedence over identity checks: distance
/// is undefined, and never computed, unless exactly one face is present.
/// A single face without an extracted descriptor cannot be proven
/// mismatched and classifies clear.
pub fn classify(
    sample: &DetectionSample,
    reference: Option<&ReferenceFace>,
    mismatch_threshold: f32,
) -> Classification {
    match sample.face_count() {
        0 => Classification::NoFace,
        1 => match (reference, &sample.faces[0].descriptor) {
            (Some(reference), Some(descriptor)) => {
                let distance = reference.descriptor.distance(descriptor);
                if distance > mismatch_threshold {
                    Classification::FaceMismatch { distance }
                } else {
                    Classification::Clear
                }
            }
            _ => Classification::Clear,
        },
        count => Classification::MultipleFaces { count },
    }
}

/// Distance of the single observed face to the reference, when defined.
///
/// Feeds the live distance readout; `None` whenever the face count is not
/// exactly one or a descriptor is unavailable.
pub fn distance_to_reference(
    sample: &DetectionSample,
    reference: Option<&ReferenceFace>,
) -> Option<f32> {
    let face = sample.single_face()?;
    let descriptor = face.descriptor.as_ref()?;
    reference.map(|r| r.descriptor.distance(descriptor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use inference_engine::{FaceBox, FaceDescriptor, FaceObservation};

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

    fn sample_with(faces: Vec<FaceObservation>) -> DetectionSample {
        DetectionSample {
            faces,
            frame_width: 640,
            frame_height: 480,
        }
    }

    /// Descriptor at `offset` euclidean distance from the origin basis
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

    #[test]
    fn test_no_face() {
        let classification = classify(&sample_with(vec![]), Some(&reference()), 0.6);
        assert_eq!(classification, Classification::NoFace);
    }

    #[test]
    fn test_multiple_faces_takes_precedence_over_mismatch() {
        // Both descriptors are far from the reference; the count still wins
        let sample = sample_with(vec![
            observation(Some(descriptor_at(0.9))),
            observation(Some(descriptor_at(0.95))),
        ]);
        let classification = classify(&sample, Some(&reference()), 0.6);
        assert_eq!(classification, Classification::MultipleFaces { count: 2 });
        assert!(classification.distance().is_none());
    }

    #[test]
    fn test_within_threshold_is_clear() {
        let sample = sample_with(vec![observation(Some(descriptor_at(0.45)))]);
        let classification = classify(&sample, Some(&reference()), 0.6);
        assert_eq!(classification, Classification::Clear);
    }

    #[test]
    fn test_beyond_threshold_is_mismatch() {
        let sample = sample_with(vec![observation(Some(descriptor_at(0.75)))]);
        let classification = classify(&sample, Some(&reference()), 0.6);
        match classification {
            Classification::FaceMismatch { distance } => assert!((distance - 0.75).abs() < 1e-5),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn test_single_face_without_reference_is_clear() {
        let sample = sample_with(vec![observation(Some(descriptor_at(0.9)))]);
        assert_eq!(classify(&sample, None, 0.6), Classification::Clear);
    }

    #[test]
    fn test_single_face_without_descriptor_is_clear() {
        let sample = sample_with(vec![observation(None)]);
        assert_eq!(classify(&sample, Some(&reference()), 0.6), Classification::Clear);
    }

    #[test]
    fn test_violation_kind_mapping() {
        assert_eq!(Classification::Clear.violation_kind(), None);
        assert_eq!(
            Classification::NoFace.violation_kind(),
            Some(ViolationKind::NoFace)
        );
        assert_eq!(
            Classification::MultipleFaces { count: 3 }.violation_kind(),
            Some(ViolationKind::MultipleFaces)
        );
        assert_eq!(
            Classification::FaceMismatch { distance: 0.8 }.violation_kind(),
            Some(ViolationKind::FaceMismatch)
        );
    }

    #[test]
    fn test_distance_readout_defined_only_for_single_face() {
        let reference = reference();
        let single = sample_with(vec![observation(Some(descriptor_at(0.45)))]);
        let crowd = sample_with(vec![
            observation(Some(descriptor_at(0.45))),
            observation(Some(descriptor_at(0.45))),
        ]);

        let d = distance_to_reference(&single, Some(&reference)).unwrap();
        assert!((d - 0.45).abs() < 1e-5);
        assert!(distance_to_reference(&crowd, Some(&reference)).is_none());
        assert!(distance_to_reference(&single, None).is_none());
    }
}
