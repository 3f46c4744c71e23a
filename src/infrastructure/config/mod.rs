pub mod server;

use crate::domain::error::{AppError, Result};
use crate::domain::settings::{Settings, SECRET_KEYS};
use crate::infrastructure::security::keyring::KeyringManager;
use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use server::ServerConfig;

pub const SETTINGS_ENV_PREFIX: &str = "QABRIDGE_";
pub const KEYRING_SERVICE: &str = "qabridge";

/// Source of the current settings record.
///
/// Operations read `current()` when they start instead of caching a copy, so
/// an edit saved from another screen is picked up by the next action.
/// Long-lived views can `subscribe()` to be told when the record changes.
pub trait SettingsProvider: Send + Sync {
    fn current(&self) -> Settings;
    fn subscribe(&self) -> watch::Receiver<Settings>;
    fn save(&self, settings: Settings) -> Result<()>;
}

pub struct InMemorySettingsStore {
    sender: watch::Sender<Settings>,
}

impl InMemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        let (sender, _) = watch::channel(settings);
        Self { sender }
    }
}

impl SettingsProvider for InMemorySettingsStore {
    fn current(&self) -> Settings {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Settings> {
        self.sender.subscribe()
    }

    fn save(&self, settings: Settings) -> Result<()> {
        self.sender.send_replace(settings);
        Ok(())
    }
}

/// Settings persisted as a JSON file, overridable from the environment.
///
/// With a keyring attached, secret fields are written to the OS credential
/// store and left blank in the file.
pub struct FileSettingsStore {
    path: PathBuf,
    keyring: Option<KeyringManager>,
    sender: watch::Sender<Settings>,
}

impl FileSettingsStore {
    pub fn open(path: impl Into<PathBuf>, keyring: Option<KeyringManager>) -> Result<Self> {
        let path = path.into();
        let initial = read_layers(&path, keyring.as_ref(), SETTINGS_ENV_PREFIX)?;
        let (sender, _) = watch::channel(initial);
        info!("Settings loaded from {}", path.display());
        Ok(Self {
            path,
            keyring,
            sender,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads every layer. Subscribers are notified only when the record
    /// actually changed; the return value says whether it did.
    pub fn reload(&self) -> Result<bool> {
        let fresh = read_layers(&self.path, self.keyring.as_ref(), SETTINGS_ENV_PREFIX)?;
        let changed = self.sender.send_if_modified(|current| {
            if *current == fresh {
                false
            } else {
                *current = fresh;
                true
            }
        });
        if changed {
            info!("Settings changed on disk, reloaded");
        }
        Ok(changed)
    }

    /// Polls the file's modification time and reloads when it moves.
    pub fn watch(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut last_seen = modified_at(&self.path);
            loop {
                ticker.tick().await;
                let seen = modified_at(&self.path);
                if seen == last_seen {
                    continue;
                }
                last_seen = seen;
                if let Err(e) = self.reload() {
                    warn!("Settings reload failed: {}", e);
                }
            }
        })
    }

    fn persist_secrets(&self, keyring: &KeyringManager, settings: &Settings) -> Result<()> {
        for key in SECRET_KEYS {
            match settings.get(key) {
                Some(value) if !value.is_empty() => keyring.store(key, value)?,
                _ => keyring.remove(key)?,
            }
        }
        Ok(())
    }
}

impl SettingsProvider for FileSettingsStore {
    fn current(&self) -> Settings {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Settings> {
        self.sender.subscribe()
    }

    fn save(&self, settings: Settings) -> Result<()> {
        let on_disk = match &self.keyring {
            Some(keyring) => {
                self.persist_secrets(keyring, &settings)?;
                settings.without_secrets()
            }
            None => settings.clone(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&on_disk)
            .map_err(|e| AppError::Internal(format!("Failed to encode settings: {}", e)))?;
        fs::write(&self.path, body)?;
        debug!("Settings written to {}", self.path.display());

        self.sender.send_replace(settings);
        Ok(())
    }
}

fn read_layers(
    path: &Path,
    keyring: Option<&KeyringManager>,
    env_prefix: &str,
) -> Result<Settings> {
    let mut settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
        .merge(Json::file(path))
        .merge(Serialized::defaults(env_overrides(env_prefix)))
        .extract()
        .map_err(|e| AppError::ConfigError(e.to_string()))?;

    if let Some(keyring) = keyring {
        for key in SECRET_KEYS {
            if settings.get(key).is_some_and(|v| !v.is_empty()) {
                continue;
            }
            match keyring.load(key) {
                Ok(Some(secret)) => settings.set(key, &secret)?,
                Ok(None) => {}
                Err(e) => warn!("Keyring lookup for {} failed: {}", key, e),
            }
        }
    }
    Ok(settings)
}

/// Raw `<prefix>*` values keyed by persisted field name. The `Env` provider
/// would parse `123` or `[a, b]` into typed values; settings are text.
fn env_overrides(prefix: &str) -> BTreeMap<String, String> {
    Env::prefixed(prefix)
        .iter()
        .map(|(key, value)| (field_name(key.as_str()), value))
        .collect()
}

/// `notion_token` -> `notionToken`, matching the persisted key names.
fn field_name(env_key: &str) -> String {
    let mut out = String::with_capacity(env_key.len());
    let mut upper_next = false;
    for ch in env_key.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path() -> PathBuf {
        std::env::temp_dir().join(format!("qabridge-settings-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn env_keys_map_to_persisted_names() {
        assert_eq!(field_name("notion_token"), "notionToken");
        assert_eq!(field_name("deepl_api_key"), "deeplApiKey");
        assert_eq!(field_name("glossary"), "glossary");
    }

    #[test]
    fn in_memory_save_notifies_subscribers() {
        let store = InMemorySettingsStore::new(Settings::default());
        let mut rx = store.subscribe();
        store
            .save(Settings {
                channel_id: "C1".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().channel_id, "C1");
        assert_eq!(store.current().channel_id, "C1");
    }

    #[test]
    fn file_store_round_trips_through_disk() {
        let path = temp_settings_path();
        let store = FileSettingsStore::open(&path, None).unwrap();
        assert_eq!(store.current(), Settings::default());

        let saved = Settings {
            notion_token: "secret_abc".to_string(),
            database_id: "db-1".to_string(),
            ..Default::default()
        };
        store.save(saved.clone()).unwrap();

        let reopened = FileSettingsStore::open(&path, None).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(reopened.current().notion_token, "secret_abc");
        assert_eq!(reopened.current().database_id, "db-1");
    }

    #[test]
    fn reload_publishes_only_on_change() {
        let path = temp_settings_path();
        let store = FileSettingsStore::open(&path, None).unwrap();
        let mut rx = store.subscribe();

        assert!(!store.reload().unwrap());
        assert!(!rx.has_changed().unwrap());

        fs::write(&path, r#"{"channelId":"C77","glossary":"버튼: Button"}"#).unwrap();
        assert!(store.reload().unwrap());
        fs::remove_file(&path).ok();

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.channel_id, "C77");
        assert_eq!(seen.glossary, "버튼: Button");
    }

    #[test]
    fn env_overrides_keep_their_text() {
        std::env::set_var("QABRIDGE_RAWENV_DATABASE_ID", "1234567890");
        std::env::set_var("QABRIDGE_RAWENV_GLOSSARY", "[결제, Payment]");
        let path = temp_settings_path();

        let settings = read_layers(&path, None, "QABRIDGE_RAWENV_").unwrap();

        assert_eq!(settings.database_id, "1234567890");
        assert_eq!(settings.glossary, "[결제, Payment]");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let path = temp_settings_path();
        fs::write(&path, "{not json").unwrap();
        let result = FileSettingsStore::open(&path, None);
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
