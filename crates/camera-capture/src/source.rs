//! Pluggable video sources

use crate::{CameraConfig, CameraError, VideoFrame};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A live video stream bound to a capture session.
///
/// Device backends implement this over their driver of choice; tests and
/// bring-up use [`SyntheticSource`]. A source is considered ready once it
/// reports non-zero dimensions and an active stream.
pub trait VideoSource: Send {
    /// Current stream dimensions; (0, 0) until the stream has settled
    fn dimensions(&self) -> (u32, u32);

    /// Whether the stream is actively delivering frames
    fn is_streaming(&self) -> bool;

    /// Grab the most recent frame
    fn grab(&mut self) -> Result<VideoFrame, CameraError>;

    /// Stop the underlying device tracks. Must be idempotent.
    fn close(&mut self);
}

/// Opens a source for a camera configuration.
///
/// The session invokes this exactly once per acquisition; a failure maps
/// to a camera access error surfaced to the user.
pub type SourceFactory =
    Box<dyn Fn(&CameraConfig) -> Result<Box<dyn VideoSource>, CameraError> + Send + Sync>;

/// Deterministic in-process video source.
///
/// Produces solid-color frames at the configured resolution, optionally
/// reporting unknown dimensions for a settling period after open, the way
/// real devices do while exposure and format negotiation finish.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    opened_at: Instant,
    settle: Duration,
    sequence: u32,
    closed: bool,
    luma: u8,
}

impl SyntheticSource {
    /// Source that is ready immediately
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            opened_at: Instant::now(),
            settle: Duration::ZERO,
            sequence: 0,
            closed: false,
            luma: 128,
        }
    }

    /// Delay readiness for `settle` after open
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Pixel intensity of the generated frames
    pub fn with_luma(mut self, luma: u8) -> Self {
        self.luma = luma;
        self
    }

    fn settled(&self) -> bool {
        !self.closed && self.opened_at.elapsed() >= self.settle
    }
}

impl VideoSource for SyntheticSource {
    fn dimensions(&self) -> (u32, u32) {
        if self.settled() {
            (self.width, self.height)
        } else {
            (0, 0)
        }
    }

    fn is_streaming(&self) -> bool {
        self.settled()
    }

    fn grab(&mut self) -> Result<VideoFrame, CameraError> {
        if self.closed {
            return Err(CameraError::Stream("source closed".to_string()));
        }
        if !self.settled() {
            return Err(CameraError::Stream("stream not yet delivering frames".to_string()));
        }
        self.sequence += 1;
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let data = vec![self.luma; (self.width * self.height * 3) as usize];
        Ok(VideoFrame::new(
            data,
            self.width,
            self.height,
            timestamp_ms,
            self.sequence,
        ))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
