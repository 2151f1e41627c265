//! The proctoring facade and sampling loop

use crate::config::ProctorConfig;
use crate::events::{EjectionReport, ProctorEvent, ViolationReport};
use crate::status::{FpsWindow, MonitorStatus};
use crate::{ExamSession, ProctorError};
use camera_capture::{CaptureSession, SourceFactory, VideoFrame};
use enrollment::EnrollmentError;
use image::RgbImage;
use inference_engine::{DetectionSample, FaceAnalyzer, ModelBundle, OnnxFaceAnalyzer};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use violation_policy::{distance_to_reference, PolicyEngine, PolicyError, PolicyOutcome};

/// Handle that cancels a running sampling loop.
///
/// Cancellation is unconditional: the loop observes the signal at its next
/// suspension point and exits without a pending last tick.
#[derive(Clone)]
pub struct StopSignal(Arc<watch::Sender<bool>>);

impl StopSignal {
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

/// One proctoring instance for one exam attempt.
///
/// Owns the capture session, the analyzer, and the policy engine; the
/// host drives it through the lifecycle methods and consumes status and
/// events through the channels.
pub struct Proctor {
    config: ProctorConfig,
    session: ExamSession,
    camera: CaptureSession,
    analyzer: Box<dyn FaceAnalyzer>,
    policy: PolicyEngine,
    status_tx: watch::Sender<MonitorStatus>,
    events_tx: mpsc::Sender<ProctorEvent>,
    events_rx: Option<mpsc::Receiver<ProctorEvent>>,
    stop_tx: Arc<watch::Sender<bool>>,
    fps: FpsWindow,
    consecutive_failures: u32,
    camera_error: Option<String>,
    last_face_count: usize,
    last_distance: Option<f32>,
    overlay: Option<RgbImage>,
}

impl Proctor {
    pub fn new(config: ProctorConfig, session: ExamSession, source_factory: SourceFactory) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (status_tx, _) = watch::channel(MonitorStatus::default());
        let (stop_tx, _) = watch::channel(false);
        let camera = CaptureSession::new(config.camera.clone(), source_factory);
        let policy = PolicyEngine::new(config.policy.clone());
        let fps = FpsWindow::new(config.sampling.fps_window);

        Self {
            config,
            session,
            camera,
            analyzer: Box::new(OnnxFaceAnalyzer::new()),
            policy,
            status_tx,
            events_tx,
            events_rx: Some(events_rx),
            stop_tx: Arc::new(stop_tx),
            fps,
            consecutive_failures: 0,
            camera_error: None,
            last_face_count: 0,
            last_distance: None,
            overlay: None,
        }
    }

    /// Replace the analyzer, for custom inference backends
    pub fn with_analyzer(mut self, analyzer: Box<dyn FaceAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Subscribe to live status snapshots
    pub fn status(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// The most recent status snapshot
    pub fn current_status(&self) -> MonitorStatus {
        self.status_tx.borrow().clone()
    }

    /// Take the event receiver; available once
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ProctorEvent>> {
        self.events_rx.take()
    }

    /// Handle that cancels a running loop from outside
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal(self.stop_tx.clone())
    }

    /// The most recent overlay rendering, for operator display
    pub fn overlay(&self) -> Option<&RgbImage> {
        self.overlay.as_ref()
    }

    /// The session's violation log so far, in order
    pub fn violations(&self) -> &[violation_policy::Violation] {
        self.policy.violations()
    }

    /// Load the model bundle and swap in the ONNX analyzer.
    ///
    /// Until this succeeds, detection is unavailable and analysis yields
    /// empty samples.
    pub fn load_models(&mut self) -> Result<(), ProctorError> {
        let bundle = ModelBundle::load(&self.config.models)?;
        self.analyzer = Box::new(OnnxFaceAnalyzer::with_bundle(bundle));
        if self.camera.is_ready() {
            self.policy.mark_ready();
        }
        self.push_status();
        Ok(())
    }

    /// Acquire the camera and wait for readiness. Idempotent.
    pub async fn start_camera(&mut self) -> Result<(), ProctorError> {
        match self.camera.start().await {
            Ok(()) => {
                self.camera_error = None;
                if self.analyzer.is_ready() {
                    self.policy.mark_ready();
                }
                self.push_status();
                Ok(())
            }
            Err(e) => {
                self.camera_error = Some(e.to_string());
                self.push_status();
                Err(e.into())
            }
        }
    }

    /// Release the camera and cancel any running loop.
    ///
    /// Safe to call any number of times, from any state. Afterward the
    /// face count reads zero, the violating flag is down, and the overlay
    /// is cleared.
    pub fn stop_camera(&mut self) {
        let _ = self.stop_tx.send(true);
        self.camera.stop();
        self.overlay = None;
        self.last_face_count = 0;
        self.last_distance = None;
        self.consecutive_failures = 0;
        self.fps.clear();
        self.policy.clear_violating();
        self.push_status();
    }

    /// Enroll the authorized face.
    ///
    /// Returns false when the cascade finds no usable face; any previous
    /// reference stays installed in that case.
    pub async fn capture_reference_face(&mut self) -> Result<bool, ProctorError> {
        if !self.analyzer.is_ready() {
            return Err(ProctorError::Policy(PolicyError::NotReady));
        }
        let result = enrollment::capture_reference(
            &mut self.camera,
            self.analyzer.as_mut(),
            &self.config.enrollment,
        )
        .await;

        match result {
            Ok(reference) => {
                self.policy.mark_ready();
                self.policy.install_reference(reference);
                self.push_status();
                Ok(true)
            }
            Err(EnrollmentError::NoFaceFound { attempts }) => {
                debug!(attempts, "enrollment found no usable face");
                self.push_status();
                Ok(false)
            }
            Err(EnrollmentError::Camera(e)) => {
                self.camera_error = Some(e.to_string());
                self.push_status();
                Err(EnrollmentError::Camera(e).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Arm the violation policy. Requires camera, models, and a reference.
    pub fn start_monitoring(&mut self) -> Result<(), ProctorError> {
        if !self.camera.is_ready() || !self.analyzer.is_ready() {
            return Err(ProctorError::Policy(PolicyError::NotReady));
        }
        self.policy.start_monitoring()?;
        self.push_status();
        Ok(())
    }

    /// Drive detection ticks until stopped or ejected.
    ///
    /// Ticks fire at the configured target rate; a missed tick is skipped,
    /// never queued, and cycles never overlap because each is awaited to
    /// completion before the next is accepted. The camera is released on
    /// exit.
    pub async fn run(&mut self) -> Result<(), ProctorError> {
        self.stop_tx.send_replace(false);
        let mut stop_rx = self.stop_tx.subscribe();
        let mut interval = tokio::time::interval(self.config.sampling.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            target_hz = self.config.sampling.target_hz,
            "sampling loop started"
        );

        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow_and_update() {
                        info!("sampling loop cancelled");
                        break;
                    }
                }
                _ = interval.tick() => {
                    if !self.tick_once().await {
                        break;
                    }
                }
            }
        }

        self.stop_camera();
        Ok(())
    }

    /// One accepted detection cycle. Returns false once the session ends.
    async fn tick_once(&mut self) -> bool {
        let started = Instant::now();

        let frame = match self.camera.grab() {
            Ok(frame) if frame.has_dimensions() => frame,
            Ok(_) => return true,
            Err(e) => {
                self.note_cycle_failure(&e.to_string()).await;
                return true;
            }
        };

        // Mirrored snapshot taken up front so violation evidence shows the
        // exact frame that was classified
        let snapshot = frame.mirrored();
        let opts = self
            .config
            .sampling
            .detect
            .descriptors(self.policy.has_reference());

        let sample = match self.analyzer.analyze(&frame, &opts) {
            Ok(sample) => {
                self.consecutive_failures = 0;
                sample
            }
            Err(e) => {
                self.note_cycle_failure(&e.to_string()).await;
                return true;
            }
        };

        self.last_face_count = sample.face_count();
        self.last_distance = distance_to_reference(&sample, self.policy.reference());
        self.render_overlay(&frame, &sample);

        let outcome = self.policy.observe(&sample, || {
            evidence::frame_to_data_uri(&snapshot).unwrap_or_else(|e| {
                warn!(error = %e, "evidence encoding failed, recording without image");
                String::new()
            })
        });

        let keep_running = match outcome {
            PolicyOutcome::Ignored | PolicyOutcome::Clear => true,
            PolicyOutcome::Violation(violation) => {
                self.emit(ProctorEvent::Violation(ViolationReport::new(
                    &self.session,
                    &violation,
                )))
                .await;
                true
            }
            PolicyOutcome::Ejected(violation) => {
                self.emit(ProctorEvent::Violation(ViolationReport::new(
                    &self.session,
                    &violation,
                )))
                .await;
                self.emit(ProctorEvent::Ejected(EjectionReport::new(
                    &self.session,
                    self.policy.violation_count(),
                )))
                .await;
                info!("session ejected, sampling loop ending");
                false
            }
        };

        self.fps.push(started.elapsed());
        self.push_status();
        keep_running
    }

    async fn note_cycle_failure(&mut self, error: &str) {
        self.consecutive_failures += 1;
        warn!(
            error,
            failures = self.consecutive_failures,
            "detection cycle failed"
        );
        if self.consecutive_failures >= self.config.sampling.max_consecutive_failures {
            warn!("restarting camera pipeline after repeated failures");
            self.camera.stop();
            match self.camera.start().await {
                Ok(()) => self.camera_error = None,
                Err(e) => self.camera_error = Some(e.to_string()),
            }
            self.consecutive_failures = 0;
        }
        self.push_status();
    }

    fn render_overlay(&mut self, frame: &VideoFrame, sample: &DetectionSample) {
        if let Some(mut canvas) = frame.to_rgb_image() {
            evidence::draw_detections(&mut canvas, sample);
            self.overlay = Some(canvas);
        }
    }

    async fn emit(&mut self, event: ProctorEvent) {
        if self.events_tx.send(event).await.is_err() {
            warn!("event receiver dropped, report lost");
        }
    }

    fn push_status(&self) {
        let status = MonitorStatus {
            phase: self.policy.phase(),
            initialized: self.camera.is_ready() && self.analyzer.is_ready(),
            models_loaded: self.analyzer.is_ready(),
            camera_ready: self.camera.is_ready(),
            has_reference: self.policy.has_reference(),
            is_monitoring: self.policy.is_monitoring(),
            is_violating: self.policy.is_violating(),
            face_count: self.last_face_count,
            violation_count: self.policy.violation_count(),
            last_distance: self.last_distance,
            effective_fps: self
                .fps
                .per_second()
                .min(self.config.sampling.target_hz as f32),
            camera_error: self.camera_error.clone(),
        };
        self.status_tx.send_replace(status);
    }
}
