use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{MoodFitError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub emotion: EmotionConfig,
    #[serde(default)]
    pub workouts: WorkoutConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_index: u32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
}

fn default_camera_width() -> u32 { 640 }
fn default_camera_height() -> u32 { 480 }
fn default_warmup_frames() -> u32 { 3 }
fn default_warmup_delay() -> u64 { 50 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
            warmup_frames: default_warmup_frames(),
            warmup_delay_ms: default_warmup_delay(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_detector_path")]
    pub detector_path: PathBuf,
    #[serde(default = "default_recognizer_path")]
    pub recognizer_path: PathBuf,
    #[serde(default = "default_emotion_path")]
    pub emotion_path: PathBuf,
}

fn default_detector_path() -> PathBuf { PathBuf::from("face_detector.onnx") }
fn default_recognizer_path() -> PathBuf { PathBuf::from("facenet.onnx") }
fn default_emotion_path() -> PathBuf { PathBuf::from("emotion_ferplus.onnx") }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_path: default_detector_path(),
            recognizer_path: default_recognizer_path(),
            emotion_path: default_emotion_path(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_detector_size")]
    pub input_width: u32,
    #[serde(default = "default_detector_size")]
    pub input_height: u32,
    #[serde(default = "default_detection_confidence")]
    pub confidence: f32,
}

fn default_detector_size() -> u32 { 640 }
fn default_detection_confidence() -> f32 { 0.5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_width: default_detector_size(),
            input_height: default_detector_size(),
            confidence: default_detection_confidence(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognizerConfig {
    /// Side of the square face crop fed to the embedding model.
    #[serde(default = "default_recognizer_input")]
    pub input_size: u32,
    #[serde(default = "default_normalization")]
    pub normalization_value: f32,
    /// Side of the square grayscale crop fed to the emotion classifier.
    #[serde(default = "default_emotion_input")]
    pub emotion_input_size: u32,
}

fn default_recognizer_input() -> u32 { 160 }
fn default_normalization() -> f32 { 127.5 }
fn default_emotion_input() -> u32 { 48 }

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            input_size: default_recognizer_input(),
            normalization_value: default_normalization(),
            emotion_input_size: default_emotion_input(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GateConfig {
    #[serde(default = "default_gate_timeout")]
    pub capture_timeout_seconds: u64,
    #[serde(default = "default_gate_timeout")]
    pub verify_timeout_seconds: u64,
    /// Euclidean distance below which two embeddings belong to the same face.
    /// Tied to the embedding model's output scale.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
}

fn default_gate_timeout() -> u64 { 30 }
fn default_match_threshold() -> f32 { 10.0 }

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            capture_timeout_seconds: default_gate_timeout(),
            verify_timeout_seconds: default_gate_timeout(),
            match_threshold: default_match_threshold(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmotionConfig {
    #[serde(default = "default_emotion_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    #[serde(default = "default_max_distinct")]
    pub max_distinct: usize,
}

fn default_emotion_timeout() -> u64 { 20 }
fn default_max_samples() -> usize { 10 }
fn default_max_distinct() -> usize { 3 }

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_emotion_timeout(),
            max_samples: default_max_samples(),
            max_distinct: default_max_distinct(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkoutConfig {
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    #[serde(default = "default_emotion_limit")]
    pub emotion_limit: usize,
    #[serde(default = "default_duration_options")]
    pub duration_options: Vec<u32>,
}

fn default_catalog_path() -> PathBuf { PathBuf::from("mood_based_workouts_updated.csv") }
fn default_emotion_limit() -> usize { 20 }
fn default_duration_options() -> Vec<u32> { vec![15, 30, 45, 60] }

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            emotion_limit: default_emotion_limit(),
            duration_options: default_duration_options(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Overrides the run-mode database location when set.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,
}

fn default_smtp_host() -> String { "smtp.gmail.com".to_string() }
fn default_smtp_port() -> u16 { 587 }
fn default_share_base_url() -> String { "https://your-app-url.com".to_string() }

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            sender: None,
            password: None,
            share_base_url: default_share_base_url(),
        }
    }
}

impl EmailConfig {
    /// Fill missing credentials from `SMTP_EMAIL` / `SMTP_PASSWORD`.
    pub fn with_env_credentials(mut self) -> Self {
        if self.sender.is_none() {
            self.sender = std::env::var("SMTP_EMAIL").ok();
        }
        if self.password.is_none() {
            self.password = std::env::var("SMTP_PASSWORD").ok();
        }
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u32,
}

fn default_optimization_level() -> u32 { 3 }

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { optimization_level: default_optimization_level() }
    }
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }

        tracing::debug!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| MoodFitError::Other(anyhow::anyhow!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(MoodFitError::Other(anyhow::anyhow!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(MoodFitError::Other(anyhow::anyhow!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }

        if self.detector.confidence < 0.0 || self.detector.confidence > 1.0 {
            return Err(MoodFitError::Other(anyhow::anyhow!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.confidence
            )));
        }

        if self.gate.match_threshold <= 0.0 {
            return Err(MoodFitError::Other(anyhow::anyhow!(
                "Match threshold must be positive, got {}", self.gate.match_threshold
            )));
        }

        for (name, secs) in [
            ("Capture timeout", self.gate.capture_timeout_seconds),
            ("Verify timeout", self.gate.verify_timeout_seconds),
            ("Emotion timeout", self.emotion.timeout_seconds),
        ] {
            if secs < 1 || secs > 120 {
                return Err(MoodFitError::Other(anyhow::anyhow!(
                    "{} must be between 1 and 120 seconds, got {}", name, secs
                )));
            }
        }

        if self.emotion.max_samples == 0 || self.emotion.max_distinct == 0 {
            return Err(MoodFitError::Other(anyhow::anyhow!(
                "Emotion sampling limits must be non-zero"
            )));
        }

        if self.workouts.emotion_limit == 0 {
            return Err(MoodFitError::Other(anyhow::anyhow!(
                "Emotion plan limit must be non-zero"
            )));
        }
        if self.workouts.duration_options.iter().any(|&d| d == 0) {
            return Err(MoodFitError::Other(anyhow::anyhow!(
                "Duration options must be positive minutes"
            )));
        }

        if self.recognizer.input_size == 0 || self.recognizer.input_size > 1024 {
            return Err(MoodFitError::Other(anyhow::anyhow!(
                "Recognizer input size must be between 1 and 1024, got {}",
                self.recognizer.input_size
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.gate.capture_timeout_seconds, 30);
        assert_eq!(config.gate.match_threshold, 10.0);
        assert_eq!(config.emotion.timeout_seconds, 20);
        assert_eq!(config.emotion.max_samples, 10);
        assert_eq!(config.workouts.emotion_limit, 20);
        assert_eq!(config.workouts.duration_options, vec![15, 30, 45, 60]);
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [gate]
            match_threshold = 0.8

            [camera]
            device_index = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.gate.match_threshold, 0.8);
        assert_eq!(config.gate.verify_timeout_seconds, 30);
        assert_eq!(config.camera.device_index, 2);
        assert_eq!(config.camera.width, 640);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(Config::from_toml("[gate]\ncapture_timeout_seconds = 0").is_err());
        assert!(Config::from_toml("[detector]\nconfidence = 1.5").is_err());
        assert!(Config::from_toml("[workouts]\nduration_options = [15, 0]").is_err());
    }

    #[test]
    fn sample_config_parses() {
        let config = Config::from_toml(include_str!("../../configs/moodfit.toml")).unwrap();
        assert_eq!(config.email.smtp_host, "smtp.gmail.com");
        assert_eq!(config.storage.database_path, None);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.gate.match_threshold, 10.0);
    }
}
