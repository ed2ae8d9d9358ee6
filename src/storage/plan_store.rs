use crate::common::{MoodFitError, Result};
use crate::storage::database::Database;
use crate::workouts::WorkoutItem;
use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Emotion,
    Duration,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKind::Emotion => "emotion",
            PlanKind::Duration => "duration",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanKind {
    type Err = MoodFitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "emotion" => Ok(PlanKind::Emotion),
            "duration" => Ok(PlanKind::Duration),
            other => Err(MoodFitError::Storage(format!("unknown plan kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub id: i64,
    pub user_id: i64,
    pub kind: PlanKind,
    pub workouts: Vec<WorkoutItem>,
    pub created_at: NaiveDateTime,
}

impl WorkoutPlan {
    pub fn total_minutes(&self) -> u32 {
        self.workouts.iter().map(|w| w.duration_minutes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: Option<i64>,
    pub completed: bool,
    pub feedback: Option<String>,
    pub completed_at: NaiveDateTime,
}

impl ProgressEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            plan_id: row.get(2)?,
            completed: row.get(3)?,
            feedback: row.get(4)?,
            completed_at: row.get(5)?,
        })
    }
}

/// Generated plans and completion events.
#[derive(Debug, Clone)]
pub struct PlanStore {
    db: Database,
}

impl PlanStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a snapshot of `workouts` and return the new plan id.
    pub fn save_workout_plan(&self, user_id: i64, kind: PlanKind, workouts: &[WorkoutItem]) -> Result<i64> {
        if workouts.is_empty() {
            return Err(MoodFitError::EmptyPlan);
        }

        let data = serde_json::to_string(workouts)?;
        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO workout_plans (user_id, type, data) VALUES (?1, ?2, ?3)",
            params![user_id, kind.as_str(), data],
        )?;

        let plan_id = conn.last_insert_rowid();
        tracing::debug!("Saved {} plan {} with {} workouts", kind, plan_id, workouts.len());
        Ok(plan_id)
    }

    /// All plans for `user_id`, newest first.
    pub fn get_workout_plans(&self, user_id: i64) -> Result<Vec<WorkoutPlan>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, type, data, created_at FROM workout_plans
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([user_id], plan_columns)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode_plan).collect()
    }

    pub fn get_workout_plan(&self, plan_id: i64) -> Result<Option<WorkoutPlan>> {
        let conn = self.db.connect()?;
        let row = conn
            .query_row(
                "SELECT id, user_id, type, data, created_at FROM workout_plans WHERE id = ?1",
                [plan_id],
                plan_columns,
            )
            .optional()?;

        row.map(decode_plan).transpose()
    }

    pub fn save_progress(&self, user_id: i64, plan_id: i64, completed: bool, feedback: Option<&str>) -> Result<i64> {
        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO progress (user_id, plan_id, completed, feedback) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, plan_id, completed, feedback],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Same as [`save_progress`](Self::save_progress) with an explicit timestamp.
    pub fn save_progress_at(
        &self,
        user_id: i64,
        plan_id: i64,
        completed: bool,
        feedback: Option<&str>,
        completed_at: NaiveDateTime,
    ) -> Result<i64> {
        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO progress (user_id, plan_id, completed, feedback, completed_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, plan_id, completed, feedback, completed_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All progress entries for `user_id`, newest first.
    pub fn get_progress(&self, user_id: i64) -> Result<Vec<ProgressEntry>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, plan_id, completed, feedback, completed_at FROM progress
             WHERE user_id = ?1 ORDER BY completed_at DESC, id DESC",
        )?;
        let entries = stmt
            .query_map([user_id], ProgressEntry::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

type PlanColumns = (i64, i64, String, String, NaiveDateTime);

fn plan_columns(row: &Row<'_>) -> rusqlite::Result<PlanColumns> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_plan((id, user_id, kind, data, created_at): PlanColumns) -> Result<WorkoutPlan> {
    Ok(WorkoutPlan {
        id,
        user_id,
        kind: kind.parse()?,
        workouts: serde_json::from_str(&data)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::UserStore;
    use chrono::NaiveDate;

    fn item(name: &str, minutes: u32) -> WorkoutItem {
        WorkoutItem {
            name: name.to_string(),
            kind: "3x12".to_string(),
            link: "https://video.example/x".to_string(),
            raw_duration: String::new(),
            duration_minutes: minutes,
            mood: "happy".to_string(),
        }
    }

    fn setup() -> (tempfile::TempDir, PlanStore, i64) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("users.db")).unwrap();
        let user = UserStore::new(db.clone()).create_user("maya", "maya@example.com", "pw").unwrap();
        (dir, PlanStore::new(db), user.id)
    }

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap().and_hms_opt(9, 30, 0).unwrap()
    }

    #[test]
    fn empty_plans_are_rejected() {
        let (_dir, plans, user_id) = setup();
        assert!(matches!(
            plans.save_workout_plan(user_id, PlanKind::Duration, &[]),
            Err(MoodFitError::EmptyPlan)
        ));
        assert!(plans.get_workout_plans(user_id).unwrap().is_empty());
    }

    #[test]
    fn plans_come_back_newest_first_with_their_snapshot() {
        let (_dir, plans, user_id) = setup();
        let first = plans.save_workout_plan(user_id, PlanKind::Emotion, &[item("Jump Squats", 3)]).unwrap();
        let second = plans
            .save_workout_plan(user_id, PlanKind::Duration, &[item("Plank", 2), item("Burpees", 3)])
            .unwrap();

        let all = plans.get_workout_plans(user_id).unwrap();
        assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(all[0].kind, PlanKind::Duration);
        assert_eq!(all[0].total_minutes(), 5);
        assert_eq!(all[1].workouts, vec![item("Jump Squats", 3)]);

        assert_eq!(plans.get_workout_plan(first).unwrap().unwrap().kind, PlanKind::Emotion);
        assert!(plans.get_workout_plan(999).unwrap().is_none());
    }

    #[test]
    fn progress_is_append_only_and_newest_first() {
        let (_dir, plans, user_id) = setup();
        let plan_id = plans.save_workout_plan(user_id, PlanKind::Emotion, &[item("Jump Squats", 3)]).unwrap();

        plans.save_progress_at(user_id, plan_id, true, None, at(1)).unwrap();
        plans.save_progress_at(user_id, plan_id, true, Some("tough one"), at(2)).unwrap();

        let entries = plans.get_progress(user_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].completed_at, at(2));
        assert_eq!(entries[0].feedback.as_deref(), Some("tough one"));
        assert_eq!(entries[1].plan_id, Some(plan_id));
        assert!(entries.iter().all(|e| e.completed));
    }

    #[test]
    fn default_timestamp_is_readable() {
        let (_dir, plans, user_id) = setup();
        let plan_id = plans.save_workout_plan(user_id, PlanKind::Emotion, &[item("Jump Squats", 3)]).unwrap();
        plans.save_progress(user_id, plan_id, true, None).unwrap();

        let entries = plans.get_progress(user_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].completed_at.and_utc().timestamp() > 0);
    }
}
