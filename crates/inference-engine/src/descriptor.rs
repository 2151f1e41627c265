//! Face identity descriptors

use serde::{Deserialize, Serialize};

/// Descriptor vector length produced by the recognizer network
pub const EMBEDDING_DIM: usize = 128;

/// Fixed-length feature vector identifying one person's face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDescriptor {
    vector: Vec<f32>,
}

impl FaceDescriptor {
    /// Wrap a raw embedding as-is
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    /// Wrap an embedding after L2 normalization.
    ///
    /// Recognizer outputs are normalized so descriptor distances are
    /// comparable across captures.
    pub fn normalized(mut vector: Vec<f32>) -> Self {
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Self { vector }
    }

    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    /// Euclidean distance to another descriptor.
    ///
    /// Mismatched lengths compare as maximally distant rather than
    /// panicking; that only happens when models from different bundles
    /// are mixed within one session.
    pub fn distance(&self, other: &FaceDescriptor) -> f32 {
        if self.vector.len() != other.vector.len() {
            return f32::MAX;
        }
        self.vector
            .iter()
            .zip(other.vector.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis(index: usize, value: f32) -> FaceDescriptor {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[index] = value;
        FaceDescriptor::new(v)
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let d = basis(0, 1.0);
        assert_eq!(d.distance(&d), 0.0);
    }

    #[test]
    fn test_distance_is_euclidean() {
        let a = basis(0, 1.0);
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[0] = 1.0;
        v[1] = 0.75;
        let b = FaceDescriptor::new(v);
        assert!((a.distance(&b) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = basis(0, 1.0);
        let b = basis(1, 1.0);
        assert!((a.distance(&b) - b.distance(&a)).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_has_unit_norm() {
        let d = FaceDescriptor::normalized(vec![3.0, 4.0]);
        let norm: f32 = d.as_slice().iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_zero_vector_unchanged() {
        let d = FaceDescriptor::normalized(vec![0.0; 4]);
        assert_eq!(d.as_slice(), &[0.0; 4]);
    }

    #[test]
    fn test_mismatched_lengths_maximally_distant() {
        let a = FaceDescriptor::new(vec![0.0; 4]);
        let b = FaceDescriptor::new(vec![0.0; 8]);
        assert_eq!(a.distance(&b), f32::MAX);
    }
}
