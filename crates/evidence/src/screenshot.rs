//! Violation evidence encoding

use crate::EvidenceError;
use base64::{engine::general_purpose::STANDARD, Engine};
use camera_capture::VideoFrame;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

/// JPEG quality for evidence images
pub const JPEG_QUALITY: u8 = 80;

/// Rasterize a frame to an embeddable `data:image/jpeg;base64,` string.
///
/// Callers pass the mirrored snapshot so the stored evidence matches the
/// preview orientation the student saw.
pub fn frame_to_data_uri(frame: &VideoFrame) -> Result<String, EvidenceError> {
    let img = frame
        .to_rgb_image()
        .ok_or_else(|| EvidenceError::Encode("frame buffer size mismatch".to_string()))?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&img)
        .map_err(|e| EvidenceError::Encode(e.to_string()))?;

    debug!(bytes = jpeg.len(), "evidence screenshot encoded");
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)))
}
