use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL};
use crate::infrastructure::{notion, slack, translate};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const SERVER_ENV_PREFIX: &str = "QABRIDGE_SERVER_";

/// Runtime options that are not part of the user-editable settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_pace_ms: u64,
    pub forward_pace_ms: u64,
    pub translate_pace_ms: u64,
    pub notion_base_url: String,
    pub notion_version: String,
    pub slack_base_url: String,
    pub deepl_base_url: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub source_lang: String,
    pub target_lang: String,
    pub settings_path: String,
    pub settings_poll_ms: u64,
    pub use_keyring: bool,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4020,
            upload_pace_ms: 400,
            forward_pace_ms: 1000,
            translate_pace_ms: 300,
            notion_base_url: notion::DEFAULT_BASE_URL.to_string(),
            notion_version: notion::DEFAULT_VERSION.to_string(),
            slack_base_url: slack::DEFAULT_BASE_URL.to_string(),
            deepl_base_url: translate::DEFAULT_DEEPL_URL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            source_lang: "KO".to_string(),
            target_lang: "EN".to_string(),
            settings_path: "qabridge.settings.json".to_string(),
            settings_poll_ms: 2000,
            use_keyring: false,
            request_timeout_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the TOML file if present, then `QABRIDGE_SERVER_*`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(SERVER_ENV_PREFIX))
            .extract::<ServerConfig>()
            .map_err(|e| AppError::ConfigError(e.to_string()))?
            .validated()
    }

    fn validated(self) -> Result<Self> {
        for (name, value) in [
            ("notion_base_url", &self.notion_base_url),
            ("slack_base_url", &self.slack_base_url),
            ("deepl_base_url", &self.deepl_base_url),
            ("gemini_base_url", &self.gemini_base_url),
        ] {
            Url::parse(value)
                .map_err(|e| AppError::ConfigError(format!("{} '{}': {}", name, value, e)))?;
        }
        if self.gemini_model.trim().is_empty() {
            return Err(AppError::ConfigError("gemini_model is empty".to_string()));
        }
        Ok(self)
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn upload_pace(&self) -> Duration {
        Duration::from_millis(self.upload_pace_ms)
    }

    pub fn forward_pace(&self) -> Duration {
        Duration::from_millis(self.forward_pace_ms)
    }

    pub fn translate_pace(&self) -> Duration {
        Duration::from_millis(self.translate_pace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
