//! Per-frame face analysis

use crate::descriptor::FaceDescriptor;
use crate::models::ModelBundle;
use crate::InferenceError;
use camera_capture::VideoFrame;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// NMS IoU threshold for merging overlapping detections
const NMS_IOU_THRESH: f32 = 0.3;

/// Side length of the square crops fed to the landmark and recognizer nets
const CROP_SIZE: u32 = 112;

/// Landmark points predicted per face
const LANDMARK_POINTS: usize = 68;

/// Detector input resolution and acceptance floor for one analysis pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectOptions {
    pub input_width: u32,
    pub input_height: u32,
    /// Minimum detector confidence for a face to be accepted
    pub score_threshold: f32,
    /// Extract identity descriptors for accepted faces
    pub with_descriptors: bool,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            input_width: 320,
            input_height: 240,
            score_threshold: 0.7,
            with_descriptors: false,
        }
    }
}

impl DetectOptions {
    pub fn score_floor(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn input_size(mut self, width: u32, height: u32) -> Self {
        self.input_width = width;
        self.input_height = height;
        self
    }

    pub fn descriptors(mut self, enabled: bool) -> Self {
        self.with_descriptors = enabled;
        self
    }
}

/// Face bounding box in frame coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One detected face
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bbox: FaceBox,
    pub confidence: f32,
    /// 68 landmark points in frame coordinates, when prediction succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<(f32, f32)>>,
    /// Identity descriptor, when requested and extraction succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<FaceDescriptor>,
}

/// Result of analyzing one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionSample {
    pub faces: Vec<FaceObservation>,
    /// Dimensions of the analyzed frame, for overlay scaling
    pub frame_width: u32,
    pub frame_height: u32,
}

impl DetectionSample {
    /// Sample with no faces and no frame geometry
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// The face, iff exactly one was observed
    pub fn single_face(&self) -> Option<&FaceObservation> {
        if self.faces.len() == 1 {
            self.faces.first()
        } else {
            None
        }
    }

    /// Highest-confidence face, if any
    pub fn best_face(&self) -> Option<&FaceObservation> {
        self.faces.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Frame analysis capability.
///
/// The policy and sampling layers depend on this seam, not on the ONNX
/// implementation, so classification logic is testable with scripted
/// observations.
pub trait FaceAnalyzer: Send {
    /// Analyze one frame. Before models are ready this returns an empty
    /// sample rather than failing.
    fn analyze(
        &mut self,
        frame: &VideoFrame,
        opts: &DetectOptions,
    ) -> Result<DetectionSample, InferenceError>;

    /// Whether models are loaded and analysis is available
    fn is_ready(&self) -> bool;
}

/// ONNX Runtime face analyzer
pub struct OnnxFaceAnalyzer {
    bundle: Option<ModelBundle>,
}

impl OnnxFaceAnalyzer {
    /// Analyzer with no models; every analysis yields an empty sample
    pub fn new() -> Self {
        Self { bundle: None }
    }

    /// Analyzer backed by a loaded bundle
    pub fn with_bundle(bundle: ModelBundle) -> Self {
        Self {
            bundle: Some(bundle),
        }
    }
}

impl Default for OnnxFaceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn is_ready(&self) -> bool {
        self.bundle.is_some()
    }

    fn analyze(
        &mut self,
        frame: &VideoFrame,
        opts: &DetectOptions,
    ) -> Result<DetectionSample, InferenceError> {
        let Some(bundle) = &self.bundle else {
            debug!("analyze called before models loaded, returning empty sample");
            return Ok(DetectionSample::empty());
        };
        if !frame.has_dimensions() {
            return Err(InferenceError::InvalidFrame(
                "frame has unknown dimensions".to_string(),
            ));
        }

        let boxes = detect_faces(&bundle.detector, frame, opts)?;

        let mut faces = Vec::with_capacity(boxes.len());
        for det in boxes {
            let bbox = FaceBox {
                x: det.x1,
                y: det.y1,
                width: det.x2 - det.x1,
                height: det.y2 - det.y1,
            };

            let landmarks = match predict_landmarks(&bundle.landmarks, frame, &bbox) {
                Ok(points) => Some(points),
                Err(e) => {
                    warn!(error = %e, "landmark prediction failed for a face");
                    None
                }
            };

            let descriptor = if opts.with_descriptors {
                match extract_descriptor(&bundle.recognizer, frame, &bbox) {
                    Ok(d) => Some(d),
                    Err(e) => {
                        warn!(error = %e, "descriptor extraction failed for a face");
                        None
                    }
                }
            } else {
                None
            };

            faces.push(FaceObservation {
                bbox,
                confidence: det.score,
                landmarks,
                descriptor,
            });
        }

        Ok(DetectionSample {
            faces,
            frame_width: frame.width,
            frame_height: frame.height,
        })
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDet {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

fn detect_faces(
    session: &ort::session::Session,
    frame: &VideoFrame,
    opts: &DetectOptions,
) -> Result<Vec<RawDet>, InferenceError> {
    let tensor = preprocess(
        frame,
        0,
        0,
        frame.width,
        frame.height,
        opts.input_width,
        opts.input_height,
        Normalization::Signed,
    );

    let inputs = ort::inputs![tensor].map_err(|e| InferenceError::Inference(e.to_string()))?;
    let outputs = session
        .run(inputs)
        .map_err(|e| InferenceError::Inference(e.to_string()))?;
    if outputs.len() < 2 {
        return Err(InferenceError::Inference(format!(
            "detector expected 2 outputs, got {}",
            outputs.len()
        )));
    }

    // Detector outputs: scores [1, N, 2] (background, face) and
    // boxes [1, N, 4] as normalized corners.
    let scores = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| InferenceError::Inference(e.to_string()))?;
    let boxes = outputs[1]
        .try_extract_tensor::<f32>()
        .map_err(|e| InferenceError::Inference(e.to_string()))?;

    let score_data = scores
        .as_slice()
        .ok_or_else(|| InferenceError::Inference("non-contiguous score tensor".to_string()))?;
    let box_data = boxes
        .as_slice()
        .ok_or_else(|| InferenceError::Inference("non-contiguous box tensor".to_string()))?;
    let candidates = score_data.len() / 2;

    let fw = frame.width as f32;
    let fh = frame.height as f32;
    let mut raw = Vec::new();
    for i in 0..candidates {
        let score = score_data[i * 2 + 1];
        if score < opts.score_threshold {
            continue;
        }
        let b = i * 4;
        if b + 4 > box_data.len() {
            break;
        }
        let x1 = (box_data[b] * fw).clamp(0.0, fw);
        let y1 = (box_data[b + 1] * fh).clamp(0.0, fh);
        let x2 = (box_data[b + 2] * fw).clamp(0.0, fw);
        let y2 = (box_data[b + 3] * fh).clamp(0.0, fh);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }
        raw.push(RawDet {
            x1,
            y1,
            x2,
            y2,
            score,
        });
    }

    Ok(nms(&mut raw, NMS_IOU_THRESH))
}

fn predict_landmarks(
    session: &ort::session::Session,
    frame: &VideoFrame,
    bbox: &FaceBox,
) -> Result<Vec<(f32, f32)>, InferenceError> {
    let (cx, cy, cw, ch) = clamp_box(frame, bbox);
    let tensor = preprocess(frame, cx, cy, cw, ch, CROP_SIZE, CROP_SIZE, Normalization::Unit);

    let inputs = ort::inputs![tensor].map_err(|e| InferenceError::Inference(e.to_string()))?;
    let outputs = session
        .run(inputs)
        .map_err(|e| InferenceError::Inference(e.to_string()))?;
    let points = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| InferenceError::Inference(e.to_string()))?;
    let data = points
        .as_slice()
        .ok_or_else(|| InferenceError::Inference("non-contiguous landmark tensor".to_string()))?;
    if data.len() < LANDMARK_POINTS * 2 {
        return Err(InferenceError::Inference(format!(
            "landmark output too short: {}",
            data.len()
        )));
    }

    // Predictions are normalized to the crop; map back to frame coordinates
    let mapped = data[..LANDMARK_POINTS * 2]
        .chunks_exact(2)
        .map(|p| {
            (
                cx as f32 + p[0] * cw as f32,
                cy as f32 + p[1] * ch as f32,
            )
        })
        .collect();
    Ok(mapped)
}

fn extract_descriptor(
    session: &ort::session::Session,
    frame: &VideoFrame,
    bbox: &FaceBox,
) -> Result<FaceDescriptor, InferenceError> {
    let (cx, cy, cw, ch) = clamp_box(frame, bbox);
    let tensor = preprocess(
        frame,
        cx,
        cy,
        cw,
        ch,
        CROP_SIZE,
        CROP_SIZE,
        Normalization::Signed,
    );

    let inputs = ort::inputs![tensor].map_err(|e| InferenceError::Inference(e.to_string()))?;
    let outputs = session
        .run(inputs)
        .map_err(|e| InferenceError::Inference(e.to_string()))?;
    let embedding = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| InferenceError::Inference(e.to_string()))?;
    let data = embedding
        .as_slice()
        .ok_or_else(|| InferenceError::Inference("non-contiguous embedding tensor".to_string()))?;

    Ok(FaceDescriptor::normalized(data.to_vec()))
}

/// Clamp a face box to the frame, returning integer crop geometry
fn clamp_box(frame: &VideoFrame, bbox: &FaceBox) -> (u32, u32, u32, u32) {
    let x = bbox.x.max(0.0) as u32;
    let y = bbox.y.max(0.0) as u32;
    let w = (bbox.width.max(1.0) as u32).min(frame.width.saturating_sub(x)).max(1);
    let h = (bbox.height.max(1.0) as u32).min(frame.height.saturating_sub(y)).max(1);
    (x, y, w, h)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Normalization {
    /// Map pixels to [-1, 1]
    Signed,
    /// Map pixels to [0, 1]
    Unit,
}

/// Resize a frame region to `out_w x out_h` as an NCHW float tensor
#[allow(clippy::too_many_arguments)]
fn preprocess(
    frame: &VideoFrame,
    region_x: u32,
    region_y: u32,
    region_w: u32,
    region_h: u32,
    out_w: u32,
    out_h: u32,
    norm: Normalization,
) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, out_h as usize, out_w as usize));

    for y in 0..out_h {
        let src_y = region_y + ((y as u64 * region_h as u64) / out_h as u64) as u32;
        let src_y = src_y.min(frame.height.saturating_sub(1));
        for x in 0..out_w {
            let src_x = region_x + ((x as u64 * region_w as u64) / out_w as u64) as u32;
            let src_x = src_x.min(frame.width.saturating_sub(1));
            let pixel = frame.get_pixel(src_x, src_y).unwrap_or([0, 0, 0]);
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = match norm {
                    Normalization::Signed => (pixel[c] as f32 / 127.5) - 1.0,
                    Normalization::Unit => pixel[c] as f32 / 255.0,
                };
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

fn nms(dets: &mut [RawDet], iou_thresh: f32) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &RawDet, b: &RawDet) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}
