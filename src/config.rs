use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the answering service
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Where downloaded transcripts land; defaults to the platform
    /// download directory
    pub download_dir: Option<PathBuf>,

    /// External transcriber command for voice input. Absent or not on PATH
    /// means the mic affordance is hidden for the session.
    pub voice_command: Option<String>,

    /// Counsel home directory
    pub counsel_home: PathBuf,

    /// UI preferences
    pub ui: UiConfig,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    pub theme: String,
    pub show_timestamps: bool,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
        let counsel_home = home.join(".counsel");

        Config {
            base_url: "http://localhost:34567".to_string(),
            request_timeout_secs: 60,
            download_dir: None,
            voice_command: None,
            counsel_home,
            ui: UiConfig {
                theme: "dark".to_string(),
                show_timestamps: true,
            },
        }
    }
}

impl Config {
    /// Load configuration from ~/.counsel/config.toml, falling back to
    /// defaults when the file does not exist yet.
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let counsel_home = home.join(".counsel");
        let config_path = counsel_home.join("config.toml");

        // Ensure the counsel directory exists
        fs::create_dir_all(&counsel_home)
            .context("Failed to create .counsel directory")?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.counsel_home = counsel_home;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.counsel_home.join("config.toml");
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolved transcript download directory.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| self.counsel_home.clone())
    }

    /// Log file written by the tracing subscriber; the terminal itself
    /// stays clean for the TUI.
    pub fn log_path(&self) -> PathBuf {
        self.counsel_home.join("counsel.log")
    }
}
