use directories::BaseDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ChatError, Result};

pub const BACKEND_URL_ENV: &str = "HABITCHAT_BACKEND_URL";
const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 15 * 60;

fn default_cache_max_age() -> u64 {
    DEFAULT_CACHE_MAX_AGE_SECS
}

/// Persisted client settings plus the signed-in identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppState {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_avatar: Option<String>,
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            access_token: None,
            user_id: None,
            user_name: None,
            user_avatar: None,
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    // TOML is the primary format. An older JSON state file is read once and rewritten as TOML.
    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("habitchat.toml"))
    }

    fn legacy_json_path() -> Option<PathBuf> {
        let proj = directories::ProjectDirs::from("com", "example", "HabitChat")?;
        Some(proj.config_dir().join("state.json"))
    }

    pub fn load() -> Self {
        let mut state = Self::toml_path()
            .and_then(|p| Self::load_toml(&p).ok())
            .or_else(|| {
                let legacy = Self::legacy_json_path()?;
                let state = Self::load_legacy_json(&legacy).ok()?;
                if let Err(e) = state.save() {
                    warn!("could not migrate {}: {}", legacy.display(), e);
                } else {
                    info!("migrated legacy state from {}", legacy.display());
                }
                Some(state)
            })
            .unwrap_or_default();
        state.apply_env();
        state
    }

    pub fn load_toml(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str::<AppState>(&text)?)
    }

    pub fn load_legacy_json(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice::<AppState>(&bytes)?)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = crate::utils::normalize_url(&url);
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::toml_path()
            .ok_or_else(|| ChatError::Config("No config dir".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    pub fn is_signed_in(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }

    pub fn clear_session(&mut self) {
        self.access_token = None;
        self.user_id = None;
        self.user_name = None;
        self.user_avatar = None;
    }
}

#[cfg(feature = "gui")]
pub fn build_ui(app: &adw::Application) {
    let state = AppState::load();
    if state.is_configured() && state.is_signed_in() {
        crate::ui::main_window::show_main_window(app);
    } else {
        crate::ui::login::show_login_window(app);
    }
}
