use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use parley_llm::{
    DEFAULT_API_KEY_ENV, DEFAULT_GEMINI_MODEL, GEMINI_PROVIDER_ID, HISTORY_WINDOW, ProviderConfig,
};
use serde::{Deserialize, Serialize};

use crate::chat::ReplyDelay;

pub const SETTINGS_DIRECTORY_NAME: &str = "parley";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "PARLEY_";
pub const DEFAULT_REPLY_DELAY_MIN_MS: u64 = 1_500;
pub const DEFAULT_REPLY_DELAY_MAX_MS: u64 = 2_500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_reply_delay_min_ms")]
    pub reply_delay_min_ms: u64,
    #[serde(default = "default_reply_delay_max_ms")]
    pub reply_delay_max_ms: u64,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            api_key_env: default_api_key_env(),
            endpoint: String::new(),
            model: default_model(),
            reply_delay_min_ms: default_reply_delay_min_ms(),
            reply_delay_max_ms: default_reply_delay_max_ms(),
            history_window: default_history_window(),
        }
    }
}

impl AppSettings {
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(&self.provider_id, &self.model)
            .with_api_key(&self.api_key)
            .with_api_key_env(&self.api_key_env)
            .with_endpoint(&self.endpoint)
    }

    pub fn reply_delay(&self) -> ReplyDelay {
        ReplyDelay::new(
            Duration::from_millis(self.reply_delay_min_ms),
            Duration::from_millis(self.reply_delay_max_ms),
        )
    }

    pub fn normalized(mut self) -> Self {
        self.provider_id = if self.provider_id.trim().is_empty() {
            default_provider_id()
        } else {
            self.provider_id.trim().to_ascii_lowercase()
        };
        self.model = if self.model.trim().is_empty() {
            default_model()
        } else {
            self.model.trim().to_string()
        };
        self.api_key = self.api_key.trim().to_string();
        self.api_key_env = self.api_key_env.trim().to_string();
        self.endpoint = self.endpoint.trim().to_string();

        if self.reply_delay_min_ms > self.reply_delay_max_ms {
            std::mem::swap(&mut self.reply_delay_min_ms, &mut self.reply_delay_max_ms);
        }
        self.history_window = self.history_window.clamp(1, HISTORY_WINDOW);

        self
    }
}

/// Settings loaded from defaults, the JSON file and `PARLEY_*` variables,
/// in increasing order of precedence.
pub struct SettingsStore {
    settings: Arc<ArcSwap<AppSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parley"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<AppSettings> {
        self.settings.load_full()
    }

    /// Re-reads every source and publishes the result.
    pub fn reload(&self) -> Arc<AppSettings> {
        let settings = Arc::new(Self::load_from(&self.config_path));
        self.settings.store(Arc::clone(&settings));
        tracing::info!("reloaded settings from {:?}", self.config_path);
        settings
    }

    fn load_from(path: &Path) -> AppSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        let figment = Figment::from(Serialized::defaults(AppSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(SETTINGS_ENV_PREFIX));

        match figment.extract::<AppSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                AppSettings::default()
            }
        }
    }
}

fn default_provider_id() -> String {
    GEMINI_PROVIDER_ID.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_reply_delay_min_ms() -> u64 {
    DEFAULT_REPLY_DELAY_MIN_MS
}

fn default_reply_delay_max_ms() -> u64 {
    DEFAULT_REPLY_DELAY_MAX_MS
}

fn default_history_window() -> usize {
    HISTORY_WINDOW
}
