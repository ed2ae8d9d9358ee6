use moodfit::{
    app::App,
    camera::{self, FrameSource, VideoDevice},
    cli::{prompt_password, shell},
    common::{Config, Paths},
    workouts::Catalog,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "moodfit")]
#[command(about = "Emotion-aware workout planner with face login")]
struct Cli {
    /// Enable development mode (local ./dev_data directory, verbose logs)
    #[arg(long, global = true)]
    dev: bool,

    /// Use system-wide paths under /etc and /var/lib
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and enroll your face
    Signup {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        /// Read from MOODFIT_PASSWORD, prompted for (without echo) when unset.
        /// Passing it on the command line leaves it in shell history.
        #[arg(long, env = "MOODFIT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Log in with password and face, then start an interactive session
    Session {
        #[arg(short, long)]
        username: String,
        /// Read from MOODFIT_PASSWORD, prompted for (without echo) when unset
        #[arg(long, env = "MOODFIT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// List the workout catalog
    Catalog {
        /// Only show workouts for this emotion
        #[arg(short, long)]
        emotion: Option<String>,
    },
    /// Capture one frame and save it
    TestCamera,
    /// List available cameras
    DetectCamera,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);
    dotenvy::dotenv().ok();

    let paths = Paths::new(cli.dev, cli.system)?;
    let config = Config::load_from_path(&paths.config_file())?;

    match cli.command {
        Commands::Signup { username, email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password("Password: ")?,
            };
            let confirm = prompt_password("Confirm password: ")?;

            let app = App::open(config, &paths)?;
            println!("Signing up {}...", username);
            app.signup(&username, &email, &password, &confirm)?;
        }
        Commands::Session { username, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password("Password: ")?,
            };

            let app = App::open(config, &paths)?;
            let session = app.login(&username, &password)?;
            shell::run(&app, session)?;
        }
        Commands::Catalog { emotion } => {
            let catalog = Catalog::load(&config.workouts.catalog_path)?;
            let items: Vec<_> = match &emotion {
                Some(emotion) => moodfit::workouts::select_by_emotion(&catalog, &[emotion], usize::MAX),
                None => catalog.items().to_vec(),
            };

            println!("📋 {} workouts\n", items.len());
            for item in &items {
                println!(
                    "  {:<30} {:<12} {} min  [{}]  {}",
                    item.name, item.kind, item.duration_minutes, item.mood, item.link
                );
            }
        }
        Commands::TestCamera => {
            println!("Testing camera...");
            let mut device = camera::Camera::new(&config)?;
            let frame = {
                let mut stream = device.start_stream()?;
                stream.next_frame()?
            };

            let save_path = paths.get_debug_path("test_capture", "jpg");
            frame
                .save(&save_path)
                .with_context(|| format!("Failed to save {}", save_path.display()))?;
            println!("Saved test image to {}", save_path.display());
        }
        Commands::DetectCamera => {
            println!("🔍 Detecting available cameras...\n");

            let cameras = camera::Camera::list_all_cameras()?;
            if cameras.is_empty() {
                println!("❌ No cameras found!");
                println!("\nTroubleshooting:");
                println!("  1. Check if cameras are connected");
                println!("  2. Ensure you have permission to access /dev/video*");
                return Ok(());
            }

            for (index, name, formats) in &cameras {
                println!("📷 /dev/video{}: {}", index, name);
                println!("   formats: {}", formats.join(", "));
            }

            println!("\n📝 To pick a camera, set in {}:", paths.config_file().display());
            println!("   [camera]");
            println!("   device_index = <NUMBER>");
        }
    }

    Ok(())
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
