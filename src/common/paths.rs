use std::path::{Path, PathBuf};
use std::fs;
use crate::common::error::{MoodFitError, Result};

pub enum RunMode {
    Development(PathBuf),  // Base directory for dev mode
    System,                // Use system paths
    User(PathBuf),         // Base directory under the user's home
}

pub struct Paths {
    mode: RunMode,
}

impl Paths {
    pub fn new(dev: bool, system: bool) -> Result<Self> {
        match (dev, system) {
            (true, true) => {
                Err(MoodFitError::Other(anyhow::anyhow!(
                    "Cannot use both --dev and --system flags"
                )))
            }
            (true, false) => {
                let paths = Self::development(Path::new("./dev_data"))?;
                println!("📁 Development mode - using local directory: ./dev_data");
                Ok(paths)
            }
            (false, true) => {
                println!("🔧 System mode - using system paths");

                for dir in ["/etc/moodfit", "/var/lib/moodfit"] {
                    if let Err(e) = fs::create_dir_all(dir) {
                        if e.kind() == std::io::ErrorKind::PermissionDenied {
                            eprintln!("Permission denied creating {}. Run with sudo for initial setup.", dir);
                        }
                    }
                }

                Ok(Self { mode: RunMode::System })
            }
            (false, false) => {
                let home = dirs::home_dir()
                    .ok_or_else(|| MoodFitError::Other(anyhow::anyhow!("Could not find home directory")))?;
                let base_dir = home.join(".local/share/moodfit");
                fs::create_dir_all(&base_dir)?;

                tracing::debug!("User mode - using home directory: {}", base_dir.display());

                Ok(Self { mode: RunMode::User(base_dir) })
            }
        }
    }

    /// Development layout rooted at `base`.
    pub fn development(base: &Path) -> Result<Self> {
        let base_dir = base.to_path_buf();
        fs::create_dir_all(&base_dir)?;
        fs::create_dir_all(base_dir.join("configs"))?;
        fs::create_dir_all(base_dir.join("debug"))?;

        Ok(Self { mode: RunMode::Development(base_dir) })
    }

    pub fn config_file(&self) -> PathBuf {
        match &self.mode {
            RunMode::Development(base) => base.join("configs/moodfit.toml"),
            RunMode::System => PathBuf::from("/etc/moodfit/moodfit.toml"),
            RunMode::User(_) => {
                // Try user config first, then system config
                if let Some(config_dir) = dirs::config_dir() {
                    let user_config = config_dir.join("moodfit/moodfit.toml");
                    if user_config.exists() {
                        return user_config;
                    }
                }
                PathBuf::from("/etc/moodfit/moodfit.toml")
            }
        }
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.mode {
            RunMode::Development(base) => base.join("users.db"),
            RunMode::System => PathBuf::from("/var/lib/moodfit/users.db"),
            RunMode::User(base) => base.join("users.db"),
        }
    }

    pub fn models_dir(&self) -> PathBuf {
        match &self.mode {
            RunMode::Development(_) => PathBuf::from("./models"),
            RunMode::System | RunMode::User(_) => PathBuf::from("/usr/share/moodfit/models"),
        }
    }

    /// Resolve a possibly relative model path against the models directory.
    pub fn model_path(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.models_dir().join(path)
        } else {
            path.to_path_buf()
        }
    }

    pub fn get_debug_path(&self, prefix: &str, extension: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        match &self.mode {
            RunMode::Development(base) => {
                let debug_dir = base.join("debug");
                fs::create_dir_all(&debug_dir).ok();
                debug_dir.join(format!("{}_{}.{}", prefix, timestamp, extension))
            }
            RunMode::System | RunMode::User(_) => {
                PathBuf::from(format!("/tmp/moodfit_{}_{}.{}", prefix, timestamp, extension))
            }
        }
    }

    /// Where inspection artifacts go; only development mode keeps them.
    pub fn debug_dir(&self) -> Option<PathBuf> {
        match &self.mode {
            RunMode::Development(base) => Some(base.join("debug")),
            RunMode::System | RunMode::User(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_layout_lives_under_base() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::development(dir.path()).unwrap();

        assert_eq!(paths.database_path(), dir.path().join("users.db"));
        assert_eq!(paths.config_file(), dir.path().join("configs/moodfit.toml"));
        assert!(paths.get_debug_path("email", "html").starts_with(dir.path().join("debug")));
        assert_eq!(paths.debug_dir(), Some(dir.path().join("debug")));
    }

    #[test]
    fn absolute_model_paths_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::development(dir.path()).unwrap();

        assert_eq!(paths.model_path(Path::new("/opt/m.onnx")), PathBuf::from("/opt/m.onnx"));
        assert_eq!(paths.model_path(Path::new("m.onnx")), PathBuf::from("./models/m.onnx"));
    }
}
