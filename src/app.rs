//! User-facing flows: signup, login, recommendations, completion and email.

use crate::camera::{DeviceOpener, V4lOpener};
use crate::common::{Config, MoodFitError, Paths, Result};
use crate::core::{
    Emotion, EmotionSensor, EnrollmentOutcome, FaceGate, OnnxRecognizer, Recognizer, VerificationOutcome,
};
use crate::ledger::{Ledger, ProgressStats};
use crate::notify::{
    duration_subject, emotion_subject, render_plan_email, share_link, PlanContext, PlanNotifier, SmtpNotifier,
};
use crate::session::{ActivePlan, Session};
use crate::storage::{Database, PlanKind, PlanStore, User, UserStore, WorkoutPlan};
use crate::workouts::{select_by_duration, select_by_emotion, Catalog};
use rand::Rng;
use std::path::PathBuf;

pub struct App {
    config: Config,
    users: UserStore,
    ledger: Ledger,
    opener: Box<dyn DeviceOpener>,
    recognizer: Box<dyn Recognizer>,
    notifier: Box<dyn PlanNotifier>,
    email_dump_dir: Option<PathBuf>,
}

impl App {
    pub fn new(
        config: Config,
        db: Database,
        opener: Box<dyn DeviceOpener>,
        recognizer: Box<dyn Recognizer>,
        notifier: Box<dyn PlanNotifier>,
    ) -> Self {
        Self {
            config,
            users: UserStore::new(db.clone()),
            ledger: Ledger::new(PlanStore::new(db)),
            opener,
            recognizer,
            notifier,
            email_dump_dir: None,
        }
    }

    /// Wire up the camera, ONNX models, SQLite file and SMTP relay for `paths`.
    pub fn open(config: Config, paths: &Paths) -> Result<Self> {
        let db_path = config
            .storage
            .database_path
            .clone()
            .unwrap_or_else(|| paths.database_path());
        let db = Database::open(&db_path)?;
        tracing::debug!("Using database {}", db.path().display());

        let opener = Box::new(V4lOpener::new(&config));
        let recognizer = Box::new(OnnxRecognizer::new(&config, paths)?);
        let notifier = SmtpNotifier::new(&config.email);
        if !notifier.is_configured() {
            tracing::warn!("SMTP sender or password not set; plan emails will fail to send");
        }
        let notifier = Box::new(notifier);

        let mut app = Self::new(config, db, opener, recognizer, notifier);
        app.email_dump_dir = paths.debug_dir();
        Ok(app)
    }

    pub fn with_email_dump(mut self, dir: PathBuf) -> Self {
        self.email_dump_dir = Some(dir);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn gate(&self) -> FaceGate<'_> {
        FaceGate::new(self.opener.as_ref(), self.recognizer.as_ref(), &self.users, &self.config.gate)
    }

    /// Validate the form, capture a face, then create the account and store
    /// the embedding. Nothing is written if the capture fails.
    pub fn signup(&self, username: &str, email: &str, password: &str, confirm: &str) -> Result<User> {
        if password != confirm {
            return Err(MoodFitError::PasswordMismatch);
        }
        if !email.contains('@') {
            return Err(MoodFitError::InvalidEmail);
        }

        let embedding = match self.gate().capture_face_embedding() {
            EnrollmentOutcome::Captured(embedding) => embedding,
            EnrollmentOutcome::Failed(failure) => return Err(failure.into_error()),
        };

        let user = self.users.create_user(username, email, password)?;
        self.users.save_face_embedding(user.id, &embedding)?;
        println!("✅ Signup successful! You can now log in.");
        Ok(user)
    }

    /// Password first, then face. Only both together open a session.
    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let user = self.users.authenticate(username, password)?;

        match self.gate().verify_face_embedding(user.id)? {
            VerificationOutcome::Verified { distance } => {
                tracing::info!("User {} logged in (face distance {:.3})", user.username, distance);
                println!("✅ Login successful! Welcome, {}", user.username);
                Ok(Session::new(user))
            }
            VerificationOutcome::Failed(failure) => Err(failure.into_error()),
        }
    }

    pub fn detect_emotions(&self, session: &mut Session) -> Result<Vec<Emotion>> {
        let sensor = EmotionSensor::new(self.opener.as_ref(), self.recognizer.as_ref(), &self.config.emotion);
        let emotions = sensor.sense()?;
        session.set_emotions(emotions.clone());
        Ok(emotions)
    }

    fn catalog(&self) -> Result<Catalog> {
        Catalog::load(&self.config.workouts.catalog_path)
    }

    /// Build and persist a plan from the session's detected emotions.
    /// `None` when there is nothing to match or nothing matched.
    pub fn plan_from_emotions(&self, session: &mut Session) -> Result<Option<ActivePlan>> {
        let catalog = self.catalog()?;
        if session.emotions().is_empty() {
            return Ok(None);
        }

        let workouts = select_by_emotion(&catalog, session.emotions(), self.config.workouts.emotion_limit);
        if workouts.is_empty() {
            return Ok(None);
        }

        let plan_id = self.ledger.record_plan(session.user().id, PlanKind::Emotion, &workouts)?;
        let plan = ActivePlan {
            plan_id,
            kind: PlanKind::Emotion,
            workouts,
            context: PlanContext::Emotions(session.emotions().iter().map(|e| e.to_string()).collect()),
        };
        session.set_active_plan(plan.clone());
        Ok(Some(plan))
    }

    pub fn plan_for_duration<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        target_minutes: u32,
        rng: &mut R,
    ) -> Result<Option<ActivePlan>> {
        let catalog = self.catalog()?;
        let workouts = select_by_duration(&catalog, target_minutes, rng);
        if workouts.is_empty() {
            return Ok(None);
        }

        let plan_id = self.ledger.record_plan(session.user().id, PlanKind::Duration, &workouts)?;
        let plan = ActivePlan {
            plan_id,
            kind: PlanKind::Duration,
            workouts,
            context: PlanContext::Duration { target_minutes },
        };
        session.set_active_plan(plan.clone());
        Ok(Some(plan))
    }

    fn active<'s>(&self, session: &'s Session, kind: PlanKind) -> Result<&'s ActivePlan> {
        session
            .active_plan(kind)
            .ok_or_else(|| MoodFitError::NoActivePlan(kind.to_string()))
    }

    /// Send the active plan of `kind` to the session user's address. The
    /// stored plan is not touched when sending fails.
    pub fn email_plan(&self, session: &Session, kind: PlanKind) -> Result<()> {
        let plan = self.active(session, kind)?;
        let subject = match plan.context {
            PlanContext::Emotions(_) => emotion_subject(),
            PlanContext::Duration { target_minutes } => duration_subject(target_minutes),
        };
        let html = render_plan_email(&subject, &session.user().username, &plan.workouts, &plan.context);

        if let Some(dir) = &self.email_dump_dir {
            std::fs::create_dir_all(dir)?;
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let path = dir.join(format!("plan_{}_email_{}.html", plan.plan_id, timestamp));
            std::fs::write(&path, &html)?;
            tracing::debug!("Wrote rendered email to {}", path.display());
        }

        self.notifier.send(&session.user().email, &subject, &html)?;
        println!("📧 Workout plan sent to {}", session.user().email);
        Ok(())
    }

    pub fn share_link(&self, session: &Session, kind: PlanKind) -> Result<String> {
        let plan = self.active(session, kind)?;
        Ok(share_link(&self.config.email.share_base_url, plan.plan_id))
    }

    pub fn complete_plan(&self, session: &Session, kind: PlanKind, feedback: Option<&str>) -> Result<i64> {
        let plan = self.active(session, kind)?;
        self.ledger.mark_completed(session.user().id, plan.plan_id, feedback)
    }

    pub fn history(&self, session: &Session) -> Result<Vec<WorkoutPlan>> {
        self.ledger.history(session.user().id)
    }

    pub fn dashboard(&self, session: &Session) -> Result<ProgressStats> {
        self.ledger.dashboard(session.user().id)
    }

    pub fn logout(&self, session: Session) -> User {
        let user = session.logout();
        println!("👋 Logged out {}", user.username);
        user
    }
}
