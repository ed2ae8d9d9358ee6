pub mod catalog;
pub mod selection;

pub use catalog::{Catalog, WorkoutItem};
pub use selection::{select_by_duration, select_by_emotion, total_minutes};
