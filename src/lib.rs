// Core modules
pub mod app;
pub mod camera;
pub mod cli;
pub mod common;
pub mod core;
pub mod ledger;
pub mod notify;
pub mod session;
pub mod storage;
pub mod workouts;

// Re-export commonly used types
pub use app::App;
pub use camera::{Camera, DeviceOpener, V4lOpener};
pub use common::{Config, MoodFitError, Paths, Result};
pub use crate::core::{Emotion, Embedding, FaceGate, OnnxRecognizer, Recognizer};
pub use ledger::{Ledger, ProgressStats};
pub use session::{ActivePlan, Session};
pub use storage::{Database, PlanKind, User, UserStore, WorkoutPlan};
pub use workouts::{Catalog, WorkoutItem};
