//! Configuration management for NormaDeck using the prefer crate.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Base URL of the hosted backend (record store + auth).
    pub backend_url: Option<String>,
    /// Public anon key for the hosted backend.
    pub anon_key: Option<String>,
    /// Explicit base URL for backend functions. When unset it is derived
    /// from `backend_url`.
    pub functions_url: Option<String>,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Filename of the cached session under the data directory.
    pub session_filename: String,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/normadeck/ for user data
        let data_dir = dirs::document_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("normadeck");

        Self {
            data_dir,
            backend_url: None,
            anon_key: None,
            functions_url: None,
            user_agent: "NormaDeck/0.3".to_string(),
            request_timeout: 30,
            session_filename: "session.json".to_string(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the full path to the cached session file.
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(&self.session_filename)
    }

    /// Base URL for backend functions, e.g. `https://x.example.co/functions/v1`.
    pub fn functions_base(&self) -> Option<String> {
        self.functions_url.clone().or_else(|| {
            self.backend_url
                .as_ref()
                .map(|base| format!("{}/functions/v1", base.trim_end_matches('/')))
        })
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target directory for data.
    #[serde(default)]
    pub target: Option<String>,
    /// Backend base URL.
    #[serde(default)]
    pub backend_url: Option<String>,
    /// Backend anon key.
    #[serde(default)]
    pub anon_key: Option<String>,
    /// Backend functions base URL override.
    #[serde(default)]
    pub functions_url: Option<String>,
    /// User agent string.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub request_timeout: Option<u64>,
}

impl Config {
    /// Load configuration using prefer crate.
    /// Automatically discovers normadeck config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("normadeck").await {
            Ok(pref_config) => {
                let target: Option<String> = pref_config.get("target").ok();
                let backend_url: Option<String> = pref_config.get("backend_url").ok();
                let anon_key: Option<String> = pref_config.get("anon_key").ok();
                let functions_url: Option<String> = pref_config.get("functions_url").ok();
                let user_agent: Option<String> = pref_config.get("user_agent").ok();
                let request_timeout: Option<u64> = pref_config.get("request_timeout").ok();

                Config {
                    target,
                    backend_url,
                    anon_key,
                    functions_url,
                    user_agent,
                    request_timeout,
                }
            }
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref target) = self.target {
            let path = shellexpand::tilde(target);
            settings.data_dir = PathBuf::from(path.as_ref());
        }
        if let Some(ref backend_url) = self.backend_url {
            settings.backend_url = Some(backend_url.clone());
        }
        if let Some(ref anon_key) = self.anon_key {
            settings.anon_key = Some(anon_key.clone());
        }
        if let Some(ref functions_url) = self.functions_url {
            settings.functions_url = Some(functions_url.clone());
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
    }
}

/// Load settings from configuration, then apply environment overrides.
pub async fn load_settings() -> Settings {
    let config = Config::load().await;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);

    if let Ok(url) = env::var("NORMADECK_URL") {
        settings.backend_url = Some(url);
    }
    if let Ok(key) = env::var("NORMADECK_ANON_KEY") {
        settings.anon_key = Some(key);
    }
    if let Ok(url) = env::var("NORMADECK_FUNCTIONS_URL") {
        settings.functions_url = Some(url);
    }

    settings
}
