//! Evidence Capture & Operator Overlay
//!
//! Cosmetic overlay drawing and violation evidence encoding. Nothing in
//! this crate may abort detection; drawing clamps instead of failing and
//! encoding errors stay local to the evidence being produced.

pub mod overlay;
pub mod screenshot;

pub use overlay::draw_detections;
pub use screenshot::{frame_to_data_uri, JPEG_QUALITY};

use thiserror::Error;

/// Evidence error types
#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("Evidence encoding failed: {0}")]
    Encode(String),
}
