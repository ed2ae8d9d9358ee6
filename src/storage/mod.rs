pub mod database;
pub mod plan_store;
pub mod user_store;

pub use database::Database;
pub use plan_store::{PlanKind, PlanStore, ProgressEntry, WorkoutPlan};
pub use user_store::{User, UserStore};
