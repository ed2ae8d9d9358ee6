pub mod smtp;
pub mod template;

use crate::common::Result;

pub use smtp::SmtpNotifier;
pub use template::{duration_subject, emotion_subject, render_plan_email, share_link, PlanContext};

/// Delivers a rendered plan email.
pub trait PlanNotifier {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}
