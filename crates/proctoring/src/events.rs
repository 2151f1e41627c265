//! Host-facing events and the violation-recording collaborator seam

use crate::ExamSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;
use violation_policy::{Violation, ViolationKind};

/// Advisory event delivered once per recorded violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationReport {
    pub session_id: Uuid,
    pub student_id: String,
    pub exam_id: String,
    pub timestamp: DateTime<Utc>,
    pub face_count: usize,
    /// Evidence image as a data URI
    pub screenshot: String,
    /// 1-based ordinal within the session
    pub violation_number: usize,
    pub kind: ViolationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl ViolationReport {
    pub(crate) fn new(session: &ExamSession, violation: &Violation) -> Self {
        Self {
            session_id: session.session_id,
            student_id: session.student_id.clone(),
            exam_id: session.exam_id.clone(),
            timestamp: violation.timestamp,
            face_count: violation.face_count,
            screenshot: violation.screenshot.clone(),
            violation_number: violation.number,
            kind: violation.kind,
            distance: violation.distance,
        }
    }
}

/// Terminal event delivered exactly once when the threshold is crossed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EjectionReport {
    pub session_id: Uuid,
    pub student_id: String,
    pub exam_id: String,
    pub timestamp: DateTime<Utc>,
    pub violation_count: usize,
}

impl EjectionReport {
    pub(crate) fn new(session: &ExamSession, violation_count: usize) -> Self {
        Self {
            session_id: session.session_id,
            student_id: session.student_id.clone(),
            exam_id: session.exam_id.clone(),
            timestamp: Utc::now(),
            violation_count,
        }
    }
}

/// Events emitted to the hosting exam application, in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProctorEvent {
    Violation(ViolationReport),
    Ejected(EjectionReport),
}

/// External violation-recording collaborator.
///
/// The host implements this over whatever persistence or notification
/// stack it runs; the pipeline only guarantees each report reaches the
/// sink exactly once, in order.
pub trait ViolationSink: Send {
    fn record_violation(&mut self, report: &ViolationReport);
    fn eject_student(&mut self, report: &EjectionReport);
}

/// Drain events into a sink until the emitting side closes.
pub async fn forward_events(mut rx: mpsc::Receiver<ProctorEvent>, sink: &mut dyn ViolationSink) {
    while let Some(event) = rx.recv().await {
        match &event {
            ProctorEvent::Violation(report) => sink.record_violation(report),
            ProctorEvent::Ejected(report) => sink.eject_student(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        violations: Vec<usize>,
        ejections: Vec<usize>,
    }

    impl ViolationSink for RecordingSink {
        fn record_violation(&mut self, report: &ViolationReport) {
            self.violations.push(report.violation_number);
        }

        fn eject_student(&mut self, report: &EjectionReport) {
            self.ejections.push(report.violation_count);
        }
    }

    fn violation(number: usize) -> Violation {
        Violation {
            number,
            kind: ViolationKind::NoFace,
            timestamp: Utc::now(),
            face_count: 0,
            screenshot: String::new(),
            distance: None,
        }
    }

    #[tokio::test]
    async fn test_forward_events_preserves_order() {
        let session = ExamSession::new("s-9", "e-4");
        let (tx, rx) = mpsc::channel(8);

        tx.send(ProctorEvent::Violation(ViolationReport::new(
            &session,
            &violation(1),
        )))
        .await
        .unwrap();
        tx.send(ProctorEvent::Violation(ViolationReport::new(
            &session,
            &violation(2),
        )))
        .await
        .unwrap();
        tx.send(ProctorEvent::Ejected(EjectionReport::new(&session, 3)))
            .await
            .unwrap();
        drop(tx);

        let mut sink = RecordingSink::default();
        forward_events(rx, &mut sink).await;

        assert_eq!(sink.violations, vec![1, 2]);
        assert_eq!(sink.ejections, vec![3]);
    }

    #[test]
    fn test_report_carries_session_identity() {
        let session = ExamSession::new("student-7", "exam-12");
        let report = ViolationReport::new(&session, &violation(2));
        assert_eq!(report.student_id, "student-7");
        assert_eq!(report.exam_id, "exam-12");
        assert_eq!(report.violation_number, 2);
        assert_eq!(report.session_id, session.session_id);
    }
}
