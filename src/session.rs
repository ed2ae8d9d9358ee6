use crate::core::Emotion;
use crate::notify::PlanContext;
use crate::storage::{PlanKind, User};
use crate::workouts::WorkoutItem;

/// A persisted plan the user is currently looking at.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePlan {
    pub plan_id: i64,
    pub kind: PlanKind,
    pub workouts: Vec<WorkoutItem>,
    pub context: PlanContext,
}

/// State of one logged-in user. Created by a successful login and consumed
/// by logout.
#[derive(Debug)]
pub struct Session {
    user: User,
    emotions: Vec<Emotion>,
    emotion_plan: Option<ActivePlan>,
    duration_plan: Option<ActivePlan>,
}

impl Session {
    pub(crate) fn new(user: User) -> Self {
        Self {
            user,
            emotions: Vec::new(),
            emotion_plan: None,
            duration_plan: None,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn emotions(&self) -> &[Emotion] {
        &self.emotions
    }

    pub(crate) fn set_emotions(&mut self, emotions: Vec<Emotion>) {
        self.emotions = emotions;
    }

    pub fn active_plan(&self, kind: PlanKind) -> Option<&ActivePlan> {
        match kind {
            PlanKind::Emotion => self.emotion_plan.as_ref(),
            PlanKind::Duration => self.duration_plan.as_ref(),
        }
    }

    pub(crate) fn set_active_plan(&mut self, plan: ActivePlan) {
        match plan.kind {
            PlanKind::Emotion => self.emotion_plan = Some(plan),
            PlanKind::Duration => self.duration_plan = Some(plan),
        }
    }

    /// End the session, handing back who was logged in.
    pub fn logout(self) -> User {
        tracing::info!("User {} logged out", self.user.username);
        self.user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(kind: PlanKind, plan_id: i64) -> ActivePlan {
        ActivePlan {
            plan_id,
            kind,
            workouts: Vec::new(),
            context: PlanContext::Duration { target_minutes: 15 },
        }
    }

    #[test]
    fn plans_are_tracked_per_kind() {
        let mut session = Session::new(User { id: 1, username: "maya".into(), email: "maya@example.com".into() });
        assert!(session.active_plan(PlanKind::Emotion).is_none());

        session.set_active_plan(plan(PlanKind::Duration, 4));
        session.set_active_plan(plan(PlanKind::Emotion, 5));
        session.set_active_plan(plan(PlanKind::Duration, 6));

        assert_eq!(session.active_plan(PlanKind::Emotion).map(|p| p.plan_id), Some(5));
        assert_eq!(session.active_plan(PlanKind::Duration).map(|p| p.plan_id), Some(6));
        assert_eq!(session.logout().username, "maya");
    }
}
