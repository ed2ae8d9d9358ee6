use crate::common::{Config, MoodFitError, Result};
use ort::{Environment, Session, SessionBuilder, Value, GraphOptimizationLevel};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

pub(crate) fn optimization_level(level: u32) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

/// Build an ONNX session for `model_path`, failing early when the file is absent.
pub(crate) fn load_session(name: &str, model_path: &Path, config: &Config) -> Result<(Session, Arc<Environment>)> {
    let environment = Arc::new(
        Environment::builder()
            .with_name(name)
            .build()
            .map_err(|e| MoodFitError::Model(format!("Failed to create environment: {}", e)))?
    );

    if !model_path.exists() {
        return Err(MoodFitError::Model(
            format!("{} model not found at: {:?}", name, model_path)
        ));
    }

    let session = SessionBuilder::new(&environment)?
        .with_optimization_level(optimization_level(config.performance.optimization_level))?
        .with_model_from_file(model_path)?;

    Ok((session, environment))
}

/// YOLOv8-face style detector: one class, boxes as centre/size.
pub struct FaceDetector {
    session: Session,
    _environment: Arc<Environment>,
    input_width: u32,
    input_height: u32,
    confidence: f32,
}

impl FaceDetector {
    pub fn new(config: &Config, model_path: &Path) -> Result<Self> {
        let (session, environment) = load_session("face_detector", model_path, config)?;

        Ok(Self {
            session,
            _environment: environment,
            input_width: config.detector.input_width,
            input_height: config.detector.input_height,
            confidence: config.detector.confidence,
        })
    }

    /// Faces sorted by confidence, in original image coordinates.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;

        let img_array = if image.width() == self.input_width && image.height() == self.input_height {
            image_to_array(image)
        } else {
            let resized = image.resize_exact(self.input_width, self.input_height, FilterType::Nearest);
            image_to_array(&resized)
        };

        let cow_array = CowArray::from(img_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let Some(output) = outputs.first() else {
            return Ok(Vec::new());
        };
        let tensor = output.try_extract::<f32>()?;
        let view = tensor.view();
        let shape = view.shape().to_vec();
        let values: Vec<f32> = view.iter().copied().collect();

        let candidates = parse_predictions(&values, &shape, self.input_width as f32, self.input_height as f32);
        let mut faces = apply_nms(candidates, 0.45);
        faces.retain(|face| face.confidence >= self.confidence);
        faces.truncate(5);

        let scale_x = orig_width / self.input_width as f32;
        let scale_y = orig_height / self.input_height as f32;
        for face in &mut faces {
            face.x1 *= scale_x;
            face.x2 *= scale_x;
            face.y1 *= scale_y;
            face.y2 *= scale_y;
        }

        Ok(faces)
    }
}

fn image_to_array(img: &DynamicImage) -> Array4<f32> {
    let rgb = img.to_rgb8();
    let width = rgb.width() as usize;
    let height = rgb.height() as usize;
    let mut array = Array4::<f32>::zeros((1, 3, height, width));

    let norm_factor = 1.0 / 255.0;
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            array[[0, c, y as usize, x as usize]] = pixel[c] as f32 * norm_factor;
        }
    }

    array
}

/// Decode raw detector output. Accepts `[1, N, 5+]`, `[1, 5+, N]` (transposed)
/// and `[N, 5+]`; coordinates may be normalized or in input pixels.
pub fn parse_predictions(values: &[f32], shape: &[usize], input_width: f32, input_height: f32) -> Vec<FaceBox> {
    let (num_predictions, prediction_length, is_transposed) = match shape {
        [_, a, b] if b > a && *a <= 10 => (*b, *a, true),
        [_, a, b] => (*a, *b, false),
        [a, b] => (*a, *b, false),
        _ => {
            tracing::warn!("Unexpected detector output shape: {:?}", shape);
            return Vec::new();
        }
    };

    if prediction_length < 5 || values.len() < num_predictions * prediction_length {
        tracing::warn!("Detector output too short for shape {:?}", shape);
        return Vec::new();
    }

    let mut faces = Vec::new();
    for i in 0..num_predictions {
        let at = |field: usize| if is_transposed {
            values[field * num_predictions + i]
        } else {
            values[i * prediction_length + field]
        };

        let (cx, cy, w, h, confidence) = (at(0), at(1), at(2), at(3), at(4));
        if confidence <= 0.001 {
            continue;
        }

        let normalized = cx <= 1.0 && cy <= 1.0 && w <= 1.0 && h <= 1.0;
        let (sx, sy) = if normalized { (input_width, input_height) } else { (1.0, 1.0) };
        let (cx, cy, w, h) = (cx * sx, cy * sy, w * sx, h * sy);

        let x1 = (cx - w / 2.0).max(0.0);
        let y1 = (cy - h / 2.0).max(0.0);
        let x2 = (cx + w / 2.0).min(input_width);
        let y2 = (cy + h / 2.0).min(input_height);

        // Skip inverted or tiny boxes
        if x2 - x1 > 10.0 && y2 - y1 > 10.0 {
            faces.push(FaceBox { x1, y1, x2, y2, confidence });
        }
    }

    faces
}

pub fn apply_nms(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|kept| calculate_iou(kept, &candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

pub fn calculate_iou(box1: &FaceBox, box2: &FaceBox) -> f32 {
    let x1 = box1.x1.max(box2.x1);
    let y1 = box1.y1.max(box2.y1);
    let x2 = box1.x2.min(box2.x2);
    let y2 = box1.y2.min(box2.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = box1.width() * box1.height() + box2.width() * box2.height() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> FaceBox {
        FaceBox { x1, y1, x2, y2, confidence }
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = face(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = face(20.0, 20.0, 30.0, 30.0, 0.9);
        assert!((calculate_iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(calculate_iou(&a, &b), 0.0);
    }

    #[test]
    fn nms_keeps_strongest_of_overlapping_boxes() {
        let boxes = vec![
            face(0.0, 0.0, 100.0, 100.0, 0.6),
            face(2.0, 2.0, 102.0, 102.0, 0.9),
            face(300.0, 300.0, 400.0, 400.0, 0.7),
        ];
        let kept = apply_nms(boxes, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }

    #[test]
    fn parses_standard_layout_in_pixels() {
        // 12 predictions of 5 fields; only the first has any confidence
        let mut values = vec![0.0f32; 12 * 5];
        values[..5].copy_from_slice(&[100.0, 100.0, 50.0, 60.0, 0.8]);
        let faces = parse_predictions(&values, &[1, 12, 5], 640.0, 640.0);
        assert_eq!(faces, vec![face(75.0, 70.0, 125.0, 130.0, 0.8)]);
    }

    #[test]
    fn parses_transposed_normalized_layout() {
        // field-major [1, 5, 12]; only prediction 3 has any confidence
        let n = 12;
        let mut values = vec![0.0f32; 5 * n];
        for (field, value) in [0.5, 0.5, 0.25, 0.25, 0.9].into_iter().enumerate() {
            values[field * n + 3] = value;
        }
        let faces = parse_predictions(&values, &[1, 5, n], 640.0, 640.0);
        assert_eq!(faces, vec![face(240.0, 240.0, 400.0, 400.0, 0.9)]);
    }

    #[test]
    fn rejects_unexpected_shapes() {
        assert!(parse_predictions(&[0.0; 5], &[5], 640.0, 640.0).is_empty());
        assert!(parse_predictions(&[0.0; 4], &[1, 1, 4], 640.0, 640.0).is_empty());
    }
}
