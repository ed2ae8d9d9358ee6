use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MoodFitError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Registration failed")]
    RegistrationFailed,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Please enter a valid email")]
    InvalidEmail,

    #[error("No Face ID data found for user {0}")]
    NoEnrollment(i64),

    #[error("Face capture timed out")]
    BiometricTimeout,

    #[error("Camera error: {0}")]
    DeviceError(String),

    #[error("Workout dataset not found: {}", .0.display())]
    DatasetMissing(PathBuf),

    #[error("Failed to send email: {0}")]
    EmailSendFailure(String),

    #[error("Refusing to save an empty workout plan")]
    EmptyPlan,

    #[error("No active {0} plan; generate one first")]
    NoActivePlan(String),

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Model error: {0}")]
    Model(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::OrtError),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MoodFitError>;
