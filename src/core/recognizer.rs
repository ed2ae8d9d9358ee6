use crate::camera::Frame;
use crate::common::{Config, MoodFitError, Paths, Result};
use crate::core::detector::{load_session, FaceBox, FaceDetector};
use ort::{Environment, Session, Value};
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

pub type Embedding = Vec<f32>;

/// Output order of the emotion classifier (FER-2013 label set).
pub const EMOTION_LABELS: [&str; 7] = ["angry", "disgust", "fear", "happy", "sad", "surprise", "neutral"];

/// Per-frame emotion classification.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionReading {
    pub dominant: String,
    pub scores: Vec<(String, f32)>,
}

/// The face recognition capability.
///
/// Both calls return [`MoodFitError::NoFaceDetected`] when the frame holds no
/// usable face; callers treat that as a skipped frame, not a failure.
pub trait Recognizer {
    fn represent(&self, frame: &Frame) -> Result<Embedding>;
    fn analyze_emotion(&self, frame: &Frame) -> Result<EmotionReading>;
}

/// Euclidean distance, `None` when the dimensions differ.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Some(sum.sqrt())
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / total).collect()
}

/// Pair classifier output with labels and pick the highest score.
pub fn reading_from_output(output: &[f32]) -> Option<EmotionReading> {
    if output.len() != EMOTION_LABELS.len() {
        return None;
    }

    // Some exports end in softmax, some emit raw logits
    let sums_to_one = (output.iter().sum::<f32>() - 1.0).abs() < 1e-3 && output.iter().all(|v| *v >= 0.0);
    let probabilities = if sums_to_one { output.to_vec() } else { softmax(output) };

    let scores: Vec<(String, f32)> = EMOTION_LABELS
        .iter()
        .zip(probabilities)
        .map(|(label, p)| (label.to_string(), p))
        .collect();

    let dominant = scores
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(label, _)| label.clone())?;

    Some(EmotionReading { dominant, scores })
}

/// ONNX-backed recognizer: face detector, embedding model and emotion classifier.
pub struct OnnxRecognizer {
    detector: FaceDetector,
    embedding_session: Session,
    emotion_session: Session,
    _environments: Vec<Arc<Environment>>,
    input_size: u32,
    normalization_value: f32,
    emotion_input_size: u32,
}

impl OnnxRecognizer {
    pub fn new(config: &Config, paths: &Paths) -> Result<Self> {
        let detector = FaceDetector::new(config, &paths.model_path(&config.models.detector_path))?;
        let (embedding_session, embedding_env) =
            load_session("face_recognizer", &paths.model_path(&config.models.recognizer_path), config)?;
        let (emotion_session, emotion_env) =
            load_session("emotion_classifier", &paths.model_path(&config.models.emotion_path), config)?;

        Ok(Self {
            detector,
            embedding_session,
            emotion_session,
            _environments: vec![embedding_env, emotion_env],
            input_size: config.recognizer.input_size,
            normalization_value: config.recognizer.normalization_value,
            emotion_input_size: config.recognizer.emotion_input_size,
        })
    }

    fn largest_face(&self, frame: &Frame) -> Result<DynamicImage> {
        let faces = self.detector.detect(frame)?;
        let face = faces
            .iter()
            .max_by(|a, b| (a.width() * a.height()).total_cmp(&(b.width() * b.height())))
            .ok_or(MoodFitError::NoFaceDetected)?;
        Ok(crop_face(frame, face))
    }

    fn run(&self, session: &Session, input: Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(session.allocator(), &cow_array)?;
        let outputs = session.run(vec![input_tensor])?;
        let output = outputs
            .first()
            .ok_or_else(|| MoodFitError::Model("model produced no output".into()))?;
        let values = output.try_extract::<f32>()?.view().iter().copied().collect();
        Ok(values)
    }
}

impl Recognizer for OnnxRecognizer {
    fn represent(&self, frame: &Frame) -> Result<Embedding> {
        let face = self.largest_face(frame)?;
        let resized = face.resize_exact(self.input_size, self.input_size, FilterType::Triangle);

        let rgb = resized.to_rgb8();
        let size = self.input_size as usize;
        let norm = self.normalization_value;
        let mut array = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                array[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - norm) / norm;
            }
        }

        self.run(&self.embedding_session, array)
    }

    fn analyze_emotion(&self, frame: &Frame) -> Result<EmotionReading> {
        let face = self.largest_face(frame)?;
        let size = self.emotion_input_size;
        let gray = face.resize_exact(size, size, FilterType::Triangle).to_luma8();

        let mut array = Array4::<f32>::zeros((1, 1, size as usize, size as usize));
        for (x, y, pixel) in gray.enumerate_pixels() {
            array[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        }

        let output = self.run(&self.emotion_session, array)?;
        reading_from_output(&output).ok_or_else(|| MoodFitError::Model(format!(
            "emotion model returned {} scores, expected {}", output.len(), EMOTION_LABELS.len()
        )))
    }
}

fn crop_face(image: &DynamicImage, face: &FaceBox) -> DynamicImage {
    let x = face.x1.max(0.0) as u32;
    let y = face.y1.max(0.0) as u32;
    let width = face.width().max(1.0) as u32;
    let height = face.height().max(1.0) as u32;

    image.crop_imm(x, y, width, height)
}
