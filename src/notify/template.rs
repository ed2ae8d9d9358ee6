use crate::workouts::{total_minutes, WorkoutItem};
use html_escape::{encode_double_quoted_attribute, encode_text};

/// What the plan was built from; decides the body line of the email.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanContext {
    Emotions(Vec<String>),
    Duration { target_minutes: u32 },
}

pub fn emotion_subject() -> String {
    "Your Emotion-Based Workout Plan 💪".to_string()
}

pub fn duration_subject(target_minutes: u32) -> String {
    format!("Your {}-Minute Workout Plan 💪", target_minutes)
}

pub fn share_link(base_url: &str, plan_id: i64) -> String {
    format!("{}/plan/{}", base_url.trim_end_matches('/'), plan_id)
}

fn body_line(context: &PlanContext, workouts: &[WorkoutItem]) -> String {
    match context {
        PlanContext::Emotions(emotions) => format!(
            "Your workout plan, tailored to your emotions ({}), is ready to energize your day!",
            emotions.join(", ")
        ),
        PlanContext::Duration { target_minutes } => format!(
            "Your {}-minute workout plan (actual duration: {} minutes) is set to boost your fitness!",
            target_minutes,
            total_minutes(workouts)
        ),
    }
}

/// HTML email for a plan. Every interpolated value is escaped.
pub fn render_plan_email(subject: &str, username: &str, workouts: &[WorkoutItem], context: &PlanContext) -> String {
    let items: String = workouts
        .iter()
        .enumerate()
        .map(|(n, workout)| {
            format!(
                "      <li><a href=\"{}\">{}. {} ({}) - {} min</a></li>\n",
                encode_double_quoted_attribute(&workout.link),
                n + 1,
                encode_text(&workout.name),
                encode_text(&workout.kind),
                workout.duration_minutes,
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <title>{title}</title>
</head>
<body>
  <h1>{title}</h1>
  <p>Hello {username},</p>
  <p>{body}</p>
  <ol>
{items}  </ol>
  <p>Stay strong and keep moving!</p>
</body>
</html>
"#,
        title = encode_text(subject),
        username = encode_text(username),
        body = encode_text(&body_line(context, workouts)),
        items = items,
    )
}
