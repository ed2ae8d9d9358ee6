pub mod detector;
pub mod emotion;
pub mod gate;
pub mod password;
pub mod recognizer;

pub use detector::{FaceBox, FaceDetector};
pub use emotion::{Emotion, EmotionSensor};
pub use gate::{EnrollmentOutcome, FaceGate, GateFailure, GatePhase, VerificationOutcome};
pub use recognizer::{euclidean_distance, Embedding, EmotionReading, OnnxRecognizer, Recognizer};
