use crate::app::App;
use crate::session::{ActivePlan, Session};
use crate::storage::PlanKind;
use crate::workouts::WorkoutItem;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, BufRead, IsTerminal, Write};

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Emotion,
    Duration(u32),
    Email(PlanKind),
    Share(PlanKind),
    Complete { kind: PlanKind, feedback: Option<String> },
    History,
    Progress,
    Help,
    Logout,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err("empty command".to_string());
        };

        let kind = |word: Option<&str>| -> Result<PlanKind, String> {
            word.ok_or_else(|| "expected 'emotion' or 'duration'".to_string())?
                .parse()
                .map_err(|_| "expected 'emotion' or 'duration'".to_string())
        };

        match command.to_lowercase().as_str() {
            "emotion" | "scan" => Ok(ShellCommand::Emotion),
            "duration" => {
                let minutes = words
                    .next()
                    .ok_or("usage: duration <minutes>")?
                    .parse::<u32>()
                    .map_err(|_| "minutes must be a positive number".to_string())?;
                if minutes == 0 {
                    return Err("minutes must be a positive number".to_string());
                }
                Ok(ShellCommand::Duration(minutes))
            }
            "email" => Ok(ShellCommand::Email(kind(words.next())?)),
            "share" => Ok(ShellCommand::Share(kind(words.next())?)),
            "complete" => {
                let kind = kind(words.next())?;
                let feedback = words.collect::<Vec<_>>().join(" ");
                Ok(ShellCommand::Complete {
                    kind,
                    feedback: (!feedback.is_empty()).then_some(feedback),
                })
            }
            "history" => Ok(ShellCommand::History),
            "progress" | "dashboard" => Ok(ShellCommand::Progress),
            "help" | "?" => Ok(ShellCommand::Help),
            "logout" | "quit" | "exit" => Ok(ShellCommand::Logout),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Print `label` and read one trimmed line; `None` once stdin is closed.
pub fn read_line(label: &str) -> io::Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

pub fn prompt(label: &str) -> io::Result<String> {
    Ok(read_line(label)?.unwrap_or_default())
}

/// Like [`prompt`], but keystrokes are not echoed when stdin is a terminal.
/// Piped input is read as a plain line.
pub fn prompt_password(label: &str) -> io::Result<String> {
    if !io::stdin().is_terminal() {
        return prompt(label);
    }

    print!("{}", label);
    io::stdout().flush()?;

    terminal::enable_raw_mode()?;
    let entered = read_hidden();
    terminal::disable_raw_mode()?;
    println!();

    entered
}

fn read_hidden() -> io::Result<String> {
    let mut password = String::new();
    loop {
        let Event::Key(key) = event::read()? else { continue };
        match apply_key(&mut password, key) {
            KeyStep::Continue => {}
            KeyStep::Done => return Ok(password),
            KeyStep::Cancelled => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "password entry cancelled"))
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum KeyStep {
    Continue,
    Done,
    Cancelled,
}

fn apply_key(password: &mut String, key: KeyEvent) -> KeyStep {
    if key.kind == KeyEventKind::Release {
        return KeyStep::Continue;
    }

    match key.code {
        KeyCode::Enter => KeyStep::Done,
        KeyCode::Esc => KeyStep::Cancelled,
        KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            KeyStep::Cancelled
        }
        KeyCode::Backspace => {
            password.pop();
            KeyStep::Continue
        }
        KeyCode::Char(c) => {
            password.push(c);
            KeyStep::Continue
        }
        _ => KeyStep::Continue,
    }
}

fn print_workouts(workouts: &[WorkoutItem]) {
    for (n, workout) in workouts.iter().enumerate() {
        println!(
            "  {}. {} ({}) - {} min  {}",
            n + 1,
            workout.name,
            workout.kind,
            workout.duration_minutes,
            workout.link
        );
    }
}

fn print_plan(plan: &ActivePlan) {
    let total: u32 = plan.workouts.iter().map(|w| w.duration_minutes).sum();
    println!("\n🏋️  {} plan #{} ({} workouts, {} min)", plan.kind, plan.plan_id, plan.workouts.len(), total);
    print_workouts(&plan.workouts);
    println!();
}

fn print_help(app: &App) {
    let options: Vec<String> = app
        .config()
        .workouts
        .duration_options
        .iter()
        .map(|d| d.to_string())
        .collect();

    println!("Commands:");
    println!("  emotion                          scan your face and build a plan from your mood");
    println!("  duration <minutes>               random plan that fits (suggested: {})", options.join(", "));
    println!("  email <emotion|duration>         email the current plan to yourself");
    println!("  share <emotion|duration>         print a link to the current plan");
    println!("  complete <emotion|duration> [feedback]");
    println!("  history                          all your plans");
    println!("  progress                         stats, streak and badges");
    println!("  logout");
}

fn run_command(app: &App, session: &mut Session, command: ShellCommand) -> crate::Result<()> {
    match command {
        ShellCommand::Emotion => {
            let emotions = app.detect_emotions(session)?;
            if emotions.is_empty() {
                println!("⚠️  No emotions detected. Try again.");
                return Ok(());
            }
            let names: Vec<&str> = emotions.iter().map(|e| e.as_str()).collect();
            println!("Detected emotions: {}", names.join(", "));

            match app.plan_from_emotions(session)? {
                Some(plan) => print_plan(&plan),
                None => println!("⚠️  No workouts match those emotions."),
            }
        }
        ShellCommand::Duration(minutes) => {
            match app.plan_for_duration(session, minutes, &mut rand::thread_rng())? {
                Some(plan) => print_plan(&plan),
                None => println!("⚠️  No workouts fit into {} minutes.", minutes),
            }
        }
        ShellCommand::Email(kind) => app.email_plan(session, kind)?,
        ShellCommand::Share(kind) => println!("🔗 {}", app.share_link(session, kind)?),
        ShellCommand::Complete { kind, feedback } => {
            app.complete_plan(session, kind, feedback.as_deref())?;
            println!("✅ Workout marked as completed!");
        }
        ShellCommand::History => {
            let plans = app.history(session)?;
            if plans.is_empty() {
                println!("No workout plans yet. Start one now!");
            }
            for plan in plans {
                println!("\n{} plan #{} - {}", plan.kind, plan.id, plan.created_at);
                print_workouts(&plan.workouts);
            }
        }
        ShellCommand::Progress => {
            let stats = app.dashboard(session)?;
            if stats.recent.is_empty() {
                println!("No progress recorded yet.");
                return Ok(());
            }
            let badges: String = stats.badges.iter().map(|b| b.to_string()).collect();
            println!("Workouts completed: {}", stats.completed);
            println!("Current streak: {} days", stats.streak);
            println!("Badges: {}", if badges.is_empty() { "-" } else { badges.as_str() });
            println!("\nRecent activity:");
            for entry in &stats.recent {
                println!(
                    "  {} plan - {} - {} - feedback: {}",
                    entry.plan_label,
                    entry.completed_at,
                    if entry.completed { "Completed" } else { "Not completed" },
                    entry.feedback.as_deref().unwrap_or("None")
                );
            }
        }
        ShellCommand::Help => print_help(app),
        ShellCommand::Logout => {}
    }
    Ok(())
}

/// Interactive loop for a logged-in user. Returns when the user logs out or
/// stdin closes; the session is consumed either way.
pub fn run(app: &App, mut session: Session) -> io::Result<()> {
    println!("Type 'help' for commands.");

    loop {
        let Some(line) = read_line(&format!("{}> ", session.user().username))? else {
            println!();
            break;
        };
        if line.is_empty() {
            continue;
        }

        match ShellCommand::parse(&line) {
            Ok(ShellCommand::Logout) => break,
            Ok(command) => {
                if let Err(e) = run_command(app, &mut session, command) {
                    println!("❌ {}", e);
                }
            }
            Err(msg) => println!("❌ {} (try 'help')", msg),
        }
    }

    app.logout(session);
    Ok(())
}
