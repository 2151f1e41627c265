//! Capture session lifecycle

use crate::readiness::wait_until;
use crate::source::{SourceFactory, VideoSource};
use crate::{CameraConfig, CameraError, VideoFrame};
use std::time::Duration;
use tracing::{debug, info, warn};

/// An exclusive camera acquisition.
///
/// At most one source is open per session; starting while one exists
/// reuses the open stream. Stopping releases the device deterministically
/// and is safe from any state.
pub struct CaptureSession {
    config: CameraConfig,
    factory: SourceFactory,
    source: Option<Box<dyn VideoSource>>,
    ready: bool,
}

impl CaptureSession {
    pub fn new(config: CameraConfig, factory: SourceFactory) -> Self {
        Self {
            config,
            factory,
            source: None,
            ready: false,
        }
    }

    /// Whether a source is currently acquired
    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// Whether the bounded readiness wait has completed for the open source
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Dimensions the open source currently reports
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.source.as_ref().map(|s| s.dimensions())
    }

    /// Acquire the camera and wait until it is delivering frames.
    ///
    /// Idempotent: a second call with a stream already open re-runs only
    /// the readiness wait against the existing stream, never a second
    /// device acquisition.
    pub async fn start(&mut self) -> Result<(), CameraError> {
        if self.source.is_none() {
            info!(device = %self.config.device, "acquiring camera");
            let source = (self.factory)(&self.config)?;
            self.source = Some(source);
        } else {
            debug!("camera already acquired, reusing stream");
        }
        self.wait_ready().await
    }

    /// Bounded wait for the open source to report non-zero dimensions and
    /// an active stream.
    pub async fn wait_ready(&mut self) -> Result<(), CameraError> {
        let source = self.source.as_ref().ok_or(CameraError::NotStarted)?;
        if self.ready && source.is_streaming() {
            return Ok(());
        }

        let timeout = Duration::from_millis(self.config.ready_timeout_ms);
        let poll = Duration::from_millis(self.config.ready_poll_ms);
        let became_ready = wait_until(
            || {
                let (w, h) = source.dimensions();
                w > 0 && h > 0 && source.is_streaming()
            },
            timeout,
            poll,
        )
        .await;

        if became_ready {
            let (w, h) = source.dimensions();
            info!(width = w, height = h, "camera ready");
            self.ready = true;
            Ok(())
        } else {
            warn!(waited_ms = self.config.ready_timeout_ms, "camera readiness wait elapsed");
            self.ready = false;
            Err(CameraError::NotReady {
                waited_ms: self.config.ready_timeout_ms,
            })
        }
    }

    /// Grab the most recent frame from the open source
    pub fn grab(&mut self) -> Result<VideoFrame, CameraError> {
        match self.source.as_mut() {
            Some(source) => source.grab(),
            None => Err(CameraError::NotStarted),
        }
    }

    /// Release the camera.
    ///
    /// Always succeeds, from any state, any number of times. All device
    /// tracks are stopped and the source dropped so a later `start` can
    /// re-acquire.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
            info!("camera released");
        }
        self.ready = false;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
