//! Face enrollment and verification against the live camera.
//!
//! Each attempt opens the camera, pulls frames through [`BoundedFrames`] until
//! it succeeds or the deadline passes, and releases the device before
//! returning. Timeouts and camera failures come back as outcome values; the
//! caller decides whether they abort its flow.

use crate::camera::{BoundedFrames, DeviceOpener, Frame};
use crate::common::config::GateConfig;
use crate::common::{MoodFitError, Result};
use crate::core::recognizer::{euclidean_distance, Embedding, Recognizer};
use crate::storage::UserStore;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum GateFailure {
    Timeout,
    DeviceError(String),
    NoEnrollment(i64),
}

impl GateFailure {
    fn device(err: MoodFitError) -> Self {
        match err {
            MoodFitError::DeviceError(msg) => GateFailure::DeviceError(msg),
            other => GateFailure::DeviceError(other.to_string()),
        }
    }

    pub fn into_error(self) -> MoodFitError {
        match self {
            GateFailure::Timeout => MoodFitError::BiometricTimeout,
            GateFailure::DeviceError(msg) => MoodFitError::DeviceError(msg),
            GateFailure::NoEnrollment(user_id) => MoodFitError::NoEnrollment(user_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatePhase {
    Idle,
    Capturing,
    Succeeded,
    Failed(GateFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentOutcome {
    Captured(Embedding),
    Failed(GateFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Verified { distance: f32 },
    Failed(GateFailure),
}

pub struct FaceGate<'a> {
    opener: &'a dyn DeviceOpener,
    recognizer: &'a dyn Recognizer,
    store: &'a UserStore,
    capture_timeout: Duration,
    verify_timeout: Duration,
    threshold: f32,
    phase: GatePhase,
}

impl<'a> FaceGate<'a> {
    pub fn new(
        opener: &'a dyn DeviceOpener,
        recognizer: &'a dyn Recognizer,
        store: &'a UserStore,
        config: &GateConfig,
    ) -> Self {
        Self {
            opener,
            recognizer,
            store,
            capture_timeout: Duration::from_secs(config.capture_timeout_seconds),
            verify_timeout: Duration::from_secs(config.verify_timeout_seconds),
            threshold: config.match_threshold,
            phase: GatePhase::Idle,
        }
    }

    pub fn with_timeouts(mut self, capture: Duration, verify: Duration) -> Self {
        self.capture_timeout = capture;
        self.verify_timeout = verify;
        self
    }

    /// Phase reached by the most recent attempt.
    pub fn phase(&self) -> &GatePhase {
        &self.phase
    }

    /// Stream frames until one yields an embedding.
    pub fn capture_face_embedding(&mut self) -> EnrollmentOutcome {
        self.phase = GatePhase::Capturing;
        println!("📷 Look at the camera...");

        match self.run_capture() {
            Ok(embedding) => {
                println!("✅ Face captured");
                self.phase = GatePhase::Succeeded;
                EnrollmentOutcome::Captured(embedding)
            }
            Err(failure) => {
                tracing::warn!("Face capture failed: {:?}", failure);
                self.phase = GatePhase::Failed(failure.clone());
                EnrollmentOutcome::Failed(failure)
            }
        }
    }

    fn run_capture(&self) -> std::result::Result<Embedding, GateFailure> {
        let mut device = self.opener.open().map_err(GateFailure::device)?;
        let mut stream = device.start_stream().map_err(GateFailure::device)?;
        let mut frames = BoundedFrames::new(stream.as_mut(), self.capture_timeout);

        while let Some(frame) = frames.next() {
            let frame = frame.map_err(GateFailure::device)?;
            if let Some(embedding) = self.embedding_for(&frame) {
                tracing::debug!("Captured {}-d embedding after {} frames", embedding.len(), frames.frames_pulled());
                return Ok(embedding);
            }
        }

        Err(GateFailure::Timeout)
    }

    /// Compare live frames with the stored embedding of `user_id` until one
    /// falls strictly inside the match threshold. Storage errors are returned
    /// as `Err`; everything else is an outcome.
    pub fn verify_face_embedding(&mut self, user_id: i64) -> Result<VerificationOutcome> {
        let Some(stored) = self.store.get_face_embedding(user_id)? else {
            let failure = GateFailure::NoEnrollment(user_id);
            self.phase = GatePhase::Failed(failure.clone());
            return Ok(VerificationOutcome::Failed(failure));
        };

        self.phase = GatePhase::Capturing;
        println!("📷 Look at the camera to verify your face...");

        let outcome = match self.run_verify(&stored) {
            Ok(distance) => {
                println!("✅ Face verified");
                self.phase = GatePhase::Succeeded;
                VerificationOutcome::Verified { distance }
            }
            Err(failure) => {
                tracing::warn!("Face verification failed for user {}: {:?}", user_id, failure);
                self.phase = GatePhase::Failed(failure.clone());
                VerificationOutcome::Failed(failure)
            }
        };

        Ok(outcome)
    }

    fn run_verify(&self, stored: &[f32]) -> std::result::Result<f32, GateFailure> {
        let mut device = self.opener.open().map_err(GateFailure::device)?;
        let mut stream = device.start_stream().map_err(GateFailure::device)?;
        let frames = BoundedFrames::new(stream.as_mut(), self.verify_timeout);

        for frame in frames {
            let frame = frame.map_err(GateFailure::device)?;
            let Some(live) = self.embedding_for(&frame) else {
                continue;
            };

            match euclidean_distance(&live, stored) {
                Some(distance) if distance < self.threshold => return Ok(distance),
                Some(distance) => {
                    tracing::warn!("Face does not match (distance {:.3}, threshold {:.3})", distance, self.threshold);
                }
                None => {
                    tracing::warn!(
                        "Embedding dimension mismatch: live {} vs stored {}",
                        live.len(),
                        stored.len()
                    );
                }
            }
        }

        Err(GateFailure::Timeout)
    }

    // None means skip this frame
    fn embedding_for(&self, frame: &Frame) -> Option<Embedding> {
        match self.recognizer.represent(frame) {
            Ok(embedding) if !embedding.is_empty() => Some(embedding),
            Ok(_) => {
                tracing::debug!("Recognizer returned an empty embedding");
                None
            }
            Err(MoodFitError::NoFaceDetected) => {
                tracing::warn!("No face in frame");
                None
            }
            Err(e) => {
                tracing::warn!("Face recognition error: {}", e);
                None
            }
        }
    }
}
