//! Video frame types and processing

use serde::{Deserialize, Serialize};

/// Decoded RGB video frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (milliseconds since the Unix epoch)
    pub timestamp_ms: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ms: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
            sequence,
        }
    }

    /// Whether the frame has known non-zero dimensions and a matching buffer
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == (self.width * self.height * 3) as usize
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Horizontally mirrored copy of the frame.
    ///
    /// Evidence snapshots use the mirrored orientation so operators see
    /// the scene the way the student saw their own preview.
    pub fn mirrored(&self) -> VideoFrame {
        let mut flipped = Vec::with_capacity(self.data.len());
        for row in 0..self.height {
            for col in (0..self.width).rev() {
                let idx = ((row * self.width + col) * 3) as usize;
                flipped.extend_from_slice(&self.data[idx..idx + 3]);
            }
        }
        VideoFrame {
            data: flipped,
            width: self.width,
            height: self.height,
            timestamp_ms: self.timestamp_ms,
            sequence: self.sequence,
        }
    }

    /// View the frame as an owned `image::RgbImage`, if the buffer is consistent
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}
