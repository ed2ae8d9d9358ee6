//! Plan history, completion events and the progress dashboard.

use crate::common::Result;
use crate::storage::{PlanKind, PlanStore, ProgressEntry, WorkoutPlan};
use crate::workouts::WorkoutItem;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;

const RECENT_ENTRIES: usize = 5;
const LIFTER_COMPLETIONS: usize = 5;
const ON_FIRE_STREAK: u32 = 3;

/// Consecutive-day streak ending at the last entry.
///
/// Entries are walked oldest first. A completed entry dated exactly one day
/// after the previous entry extends the streak; anything else restarts it at
/// 1 for a completed entry or 0 otherwise.
pub fn compute_streak(entries: &[ProgressEntry]) -> u32 {
    let mut ordered: Vec<&ProgressEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.completed_at, e.id));

    let mut streak = 0;
    let mut last_date = None;
    for entry in ordered {
        let date = entry.completed_at.date();
        let consecutive = match last_date {
            None => true,
            Some(prev) => date.signed_duration_since(prev).num_days() == 1,
        };

        streak = if entry.completed && consecutive {
            streak + 1
        } else if entry.completed {
            1
        } else {
            0
        };
        last_date = Some(date);
    }
    streak
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Lifter,
    OnFire,
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Badge::Lifter => f.write_str("🏋️"),
            Badge::OnFire => f.write_str("🔥"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentActivity {
    /// "Emotion", "Duration" or "Unknown" when the plan is gone.
    pub plan_label: String,
    pub completed: bool,
    pub feedback: Option<String>,
    pub completed_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub completed: usize,
    pub streak: u32,
    pub badges: Vec<Badge>,
    pub recent: Vec<RecentActivity>,
}

fn plan_label(kind: PlanKind) -> String {
    match kind {
        PlanKind::Emotion => "Emotion".to_string(),
        PlanKind::Duration => "Duration".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    plans: PlanStore,
}

impl Ledger {
    pub fn new(plans: PlanStore) -> Self {
        Self { plans }
    }

    pub fn store(&self) -> &PlanStore {
        &self.plans
    }

    /// Persist a copy of `workouts` as a new plan.
    pub fn record_plan(&self, user_id: i64, kind: PlanKind, workouts: &[WorkoutItem]) -> Result<i64> {
        let snapshot = workouts.to_vec();
        self.plans.save_workout_plan(user_id, kind, &snapshot)
    }

    /// Append a completion event; earlier events for the plan are left alone.
    pub fn mark_completed(&self, user_id: i64, plan_id: i64, feedback: Option<&str>) -> Result<i64> {
        let feedback = feedback.map(str::trim).filter(|f| !f.is_empty());
        let entry_id = self.plans.save_progress(user_id, plan_id, true, feedback)?;
        tracing::info!("User {} completed plan {}", user_id, plan_id);
        Ok(entry_id)
    }

    pub fn history(&self, user_id: i64) -> Result<Vec<WorkoutPlan>> {
        self.plans.get_workout_plans(user_id)
    }

    pub fn dashboard(&self, user_id: i64) -> Result<ProgressStats> {
        let entries = self.plans.get_progress(user_id)?;
        let kinds: HashMap<i64, PlanKind> = self
            .plans
            .get_workout_plans(user_id)?
            .into_iter()
            .map(|plan| (plan.id, plan.kind))
            .collect();

        let completed = entries.iter().filter(|e| e.completed).count();
        let streak = compute_streak(&entries);

        let mut badges = Vec::new();
        if completed >= LIFTER_COMPLETIONS {
            badges.push(Badge::Lifter);
        }
        if streak >= ON_FIRE_STREAK {
            badges.push(Badge::OnFire);
        }

        let recent = entries
            .iter()
            .take(RECENT_ENTRIES)
            .map(|entry| RecentActivity {
                plan_label: entry
                    .plan_id
                    .and_then(|id| kinds.get(&id))
                    .map(|kind| plan_label(*kind))
                    .unwrap_or_else(|| "Unknown".to_string()),
                completed: entry.completed,
                feedback: entry.feedback.clone(),
                completed_at: entry.completed_at,
            })
            .collect();

        Ok(ProgressStats { completed, streak, badges, recent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, UserStore};
    use crate::workouts::{select_by_emotion, Catalog};
    use chrono::NaiveDate;

    fn entry(id: i64, day: u32, completed: bool) -> ProgressEntry {
        ProgressEntry {
            id,
            user_id: 1,
            plan_id: Some(1),
            completed,
            feedback: None,
            completed_at: NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(18, 0, 0).unwrap(),
        }
    }

    fn setup() -> (tempfile::TempDir, Ledger, i64) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("users.db")).unwrap();
        let user = UserStore::new(db.clone()).create_user("maya", "maya@example.com", "pw").unwrap();
        (dir, Ledger::new(PlanStore::new(db)), user.id)
    }

    #[test]
    fn three_consecutive_days() {
        let entries = vec![entry(1, 1, true), entry(2, 2, true), entry(3, 3, true)];
        assert_eq!(compute_streak(&entries), 3);
    }

    #[test]
    fn gap_resets_to_one() {
        let entries = vec![entry(1, 1, true), entry(2, 2, true), entry(3, 4, true)];
        assert_eq!(compute_streak(&entries), 1);
    }

    #[test]
    fn order_of_input_does_not_matter() {
        let entries = vec![entry(3, 3, true), entry(1, 1, true), entry(2, 2, true)];
        assert_eq!(compute_streak(&entries), 3);
    }

    #[test]
    fn incomplete_entry_zeroes_the_streak() {
        let entries = vec![entry(1, 1, true), entry(2, 2, false)];
        assert_eq!(compute_streak(&entries), 0);

        let entries = vec![entry(1, 1, true), entry(2, 2, false), entry(3, 3, true)];
        assert_eq!(compute_streak(&entries), 1);
    }

    #[test]
    fn same_day_completions_restart_at_one() {
        let entries = vec![entry(1, 1, true), entry(2, 1, true)];
        assert_eq!(compute_streak(&entries), 1);
        assert_eq!(compute_streak(&[]), 0);
    }

    #[test]
    fn jump_squats_end_to_end() {
        let (_dir, ledger, user_id) = setup();
        let csv = "Exercise,Sets,Video_Link,Duration,Mood\nJump Squats,3x12,https://youtu.be/js,,['happy']\n";
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();

        let picked = select_by_emotion(&catalog, &["Happy"], 20);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "Jump Squats");
        assert_eq!(picked[0].kind, "3x12");
        assert_eq!(picked[0].duration_minutes, 3);

        let plan_id = ledger.record_plan(user_id, PlanKind::Emotion, &picked).unwrap();
        ledger.mark_completed(user_id, plan_id, None).unwrap();

        let entries = ledger.store().get_progress(user_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].completed);
        assert_eq!(entries[0].plan_id, Some(plan_id));
    }

    #[test]
    fn dashboard_counts_badges_and_recent_activity() {
        let (_dir, ledger, user_id) = setup();
        let catalog = Catalog::from_reader(
            "Exercise,Sets,Video_Link,Duration,Mood\nLunges,3x10,https://youtu.be/l,,sad\n".as_bytes(),
        )
        .unwrap();
        let plan_id = ledger.record_plan(user_id, PlanKind::Duration, catalog.items()).unwrap();

        let store = ledger.store();
        for day in 1..=6 {
            let at = NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(7, 0, 0).unwrap();
            store.save_progress_at(user_id, plan_id, true, Some("good"), at).unwrap();
        }

        let stats = ledger.dashboard(user_id).unwrap();
        assert_eq!(stats.completed, 6);
        assert_eq!(stats.streak, 6);
        assert_eq!(stats.badges, vec![Badge::Lifter, Badge::OnFire]);
        assert_eq!(stats.recent.len(), 5);
        assert_eq!(stats.recent[0].plan_label, "Duration");
        assert_eq!(stats.recent[0].completed_at.date(), NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
    }

    #[test]
    fn repeated_completions_are_separate_rows() {
        let (_dir, ledger, user_id) = setup();
        let catalog = Catalog::from_reader(
            "Exercise,Sets,Video_Link,Duration,Mood\nLunges,3x10,https://youtu.be/l,,sad\n".as_bytes(),
        )
        .unwrap();
        let plan_id = ledger.record_plan(user_id, PlanKind::Emotion, catalog.items()).unwrap();

        ledger.mark_completed(user_id, plan_id, Some("  ")).unwrap();
        ledger.mark_completed(user_id, plan_id, Some("again")).unwrap();

        let entries = ledger.store().get_progress(user_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].feedback.as_deref(), Some("again"));
        assert_eq!(entries[1].feedback, None);
        assert_eq!(ledger.history(user_id).unwrap().len(), 1);
    }
}
